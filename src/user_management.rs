use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::{doc, Document};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::user::PublicUser;
use crate::models::{Role, User};
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub department: Option<String>,
    pub about: Option<String>,
    pub srn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FindUserQuery {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
}

pub async fn fetch_user(state: &AppState, user_id: &str) -> ApiResult<Option<User>> {
    Ok(state
        .mongodb
        .collection::<User>(db::USERS)
        .find_one(doc! { "_id": user_id })
        .await?)
}

/// Builds the `$set` document for a profile edit. Only students carry an SRN.
pub fn profile_update(role: Role, req: &UpdateProfileRequest) -> Document {
    let mut set_doc = doc! {};
    if let Some(name) = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        set_doc.insert("name", name);
    }
    if let Some(dept) = &req.department {
        set_doc.insert("department", dept.clone());
    }
    if let Some(about) = &req.about {
        set_doc.insert("about", about.clone());
    }
    if role == Role::Student {
        if let Some(srn) = &req.srn {
            set_doc.insert("srn", srn.clone());
        }
    }
    set_doc
}

/// GET /users/me
pub async fn get_me(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let user = fetch_user(&data, &session.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(HttpResponse::Ok().json(PublicUser::from(user)))
}

/// PUT /users/me
pub async fn update_me(
    session: Session,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> ApiResult<HttpResponse> {
    let set_doc = profile_update(session.role, &payload);
    if set_doc.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let res = data
        .mongodb
        .collection::<User>(db::USERS)
        .update_one(doc! { "_id": &session.user_id }, doc! { "$set": set_doc })
        .await?;
    if res.matched_count == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    info!("Profile updated for {}", session.user_id);
    get_me(session, data).await
}

/// GET /users/{id}
pub async fn get_user_by_id(
    _session: Session,
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    match fetch_user(&data, &path.into_inner()).await? {
        Some(user) => Ok(HttpResponse::Ok().json(PublicUser::from(user))),
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

/// GET /users
pub async fn list_users(
    session: Session,
    data: web::Data<AppState>,
    query: web::Query<ListUsersQuery>,
) -> ApiResult<HttpResponse> {
    session.require_admin()?;
    let filter = match query.role {
        Some(role) => doc! { "role": role.as_str() },
        None => doc! {},
    };
    let users: Vec<User> = data
        .mongodb
        .collection::<User>(db::USERS)
        .find(filter)
        .sort(doc! { "name": 1 })
        .await?
        .try_collect()
        .await?;
    let users: Vec<PublicUser> = users.into_iter().map(PublicUser::from).collect();
    Ok(HttpResponse::Ok().json(users))
}

/// GET /users/find?query=
pub async fn find_user_email(
    _session: Session,
    query: web::Query<FindUserQuery>,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let term = query.query.trim();
    if term.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }
    let filter = doc! { "email": { "$regex": regex::escape(term), "$options": "i" } };
    let users: Vec<User> = data
        .mongodb
        .collection::<User>(db::USERS)
        .find(filter)
        .limit(20)
        .await?
        .try_collect()
        .await?;
    let users: Vec<PublicUser> = users.into_iter().map(PublicUser::from).collect();
    Ok(HttpResponse::Ok().json(users))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faculty_cannot_set_srn() {
        let req = UpdateProfileRequest {
            name: Some("Dr. Rao".into()),
            department: None,
            about: Some("Distributed systems".into()),
            srn: Some("PES1".into()),
        };
        let set_doc = profile_update(Role::Faculty, &req);
        assert_eq!(set_doc.get_str("name").unwrap(), "Dr. Rao");
        assert!(set_doc.get("srn").is_none());

        let set_doc = profile_update(Role::Student, &req);
        assert_eq!(set_doc.get_str("srn").unwrap(), "PES1");
    }

    #[test]
    fn blank_name_is_ignored() {
        let req = UpdateProfileRequest {
            name: Some("   ".into()),
            department: None,
            about: None,
            srn: None,
        };
        assert!(profile_update(Role::Student, &req).is_empty());
    }
}
