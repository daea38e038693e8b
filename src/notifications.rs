use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::{debug, error};
use mongodb::bson::doc;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::chat_server::{Deliver, PushEvent};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{new_id, Notification};
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

/// Stores an in-app notification and pushes it to any open socket of `to`.
/// A failed write is logged and dropped.
pub async fn notify(state: &AppState, to: &str, message: String, kind: &str, link: Option<String>) {
    let notification = Notification {
        id: new_id(),
        to: to.to_string(),
        message,
        link,
        kind: kind.to_string(),
        read: false,
        timestamp: Utc::now(),
    };
    match state
        .mongodb
        .collection::<Notification>(db::NOTIFICATIONS)
        .insert_one(&notification)
        .await
    {
        Ok(_) => state.chat_server.do_send(Deliver {
            user_id: notification.to.clone(),
            event: PushEvent::Notification(notification),
        }),
        Err(e) => error!("Failed to store notification for {}: {}", to, e),
    }
}

/// A read-mark is fine as long as the notification exists for this user,
/// whether or not it was already read. Yields whether this call flipped it.
pub fn read_mark_outcome(matched: u64, modified: u64) -> ApiResult<bool> {
    if matched == 0 {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }
    Ok(modified > 0)
}

/// GET /notifications
pub async fn list_notifications(
    session: Session,
    data: web::Data<AppState>,
    query: web::Query<NotificationQuery>,
) -> ApiResult<HttpResponse> {
    let mut filter = doc! { "to": &session.user_id };
    if query.unread {
        filter.insert("read", false);
    }
    let items: Vec<Notification> = data
        .mongodb
        .collection::<Notification>(db::NOTIFICATIONS)
        .find(filter)
        .sort(doc! { "timestamp": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(items))
}

/// POST /notifications/{id}/read
pub async fn mark_read(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let res = data
        .mongodb
        .collection::<Notification>(db::NOTIFICATIONS)
        .update_one(
            doc! { "_id": path.into_inner(), "to": &session.user_id },
            doc! { "$set": { "read": true } },
        )
        .await?;
    let changed = read_mark_outcome(res.matched_count, res.modified_count)?;
    if !changed {
        debug!("Notification already read");
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "read": true, "changed": changed })))
}

/// POST /notifications/read_all
pub async fn mark_all_read(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let res = data
        .mongodb
        .collection::<Notification>(db::NOTIFICATIONS)
        .update_many(
            doc! { "to": &session.user_id, "read": false },
            doc! { "$set": { "read": true } },
        )
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": res.modified_count })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_twice_is_not_an_error() {
        assert_eq!(read_mark_outcome(1, 1).unwrap(), true);
        // already read: matched without modifying
        assert_eq!(read_mark_outcome(1, 0).unwrap(), false);
    }

    #[test]
    fn unknown_notification_is_not_found() {
        assert!(matches!(read_mark_outcome(0, 0), Err(ApiError::NotFound(_))));
    }
}
