// File: chat.rs

use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use log::error;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::chat_server::CreateMessage;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::chat::chat_pair_id;
use crate::models::ChatMessage;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Latest message and unread count for one conversation partner.
#[derive(Debug, Serialize, PartialEq)]
pub struct ConversationSummary {
    pub peer_id: String,
    pub last_message: String,
    pub last_at: DateTime<Utc>,
    pub unread: usize,
}

pub fn summarize_conversations(user_id: &str, messages: &[ChatMessage]) -> Vec<ConversationSummary> {
    let mut by_peer: HashMap<&str, ConversationSummary> = HashMap::new();
    for m in messages {
        let peer = if m.sender == user_id { m.receiver.as_str() } else { m.sender.as_str() };
        let entry = by_peer.entry(peer).or_insert_with(|| ConversationSummary {
            peer_id: peer.to_string(),
            last_message: m.message.clone(),
            last_at: m.timestamp,
            unread: 0,
        });
        if m.timestamp > entry.last_at {
            entry.last_message = m.message.clone();
            entry.last_at = m.timestamp;
        }
        if m.receiver == user_id && !m.read {
            entry.unread += 1;
        }
    }
    let mut out: Vec<ConversationSummary> = by_peer.into_values().collect();
    out.sort_by(|a, b| b.last_at.cmp(&a.last_at));
    out
}

/// GET /chats
pub async fn list_conversations(
    session: Session,
    data: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let messages: Vec<ChatMessage> = data
        .mongodb
        .collection::<ChatMessage>(db::CHATS)
        .find(doc! { "$or": [
            { "sender": &session.user_id },
            { "receiver": &session.user_id },
        ] })
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(summarize_conversations(&session.user_id, &messages)))
}

/// GET /chats/{peer_id}
/// Full conversation, oldest first. Opening it marks the caller's incoming
/// messages as read.
pub async fn get_conversation(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let peer_id = path.into_inner();
    let chats = data.mongodb.collection::<ChatMessage>(db::CHATS);
    let pair = chat_pair_id(&session.user_id, &peer_id);

    let messages: Vec<ChatMessage> = chats
        .find(doc! { "chat_pair": &pair })
        .sort(doc! { "timestamp": 1 })
        .await?
        .try_collect()
        .await?;
    chats
        .update_many(
            doc! { "chat_pair": &pair, "receiver": &session.user_id, "read": false },
            doc! { "$set": { "read": true } },
        )
        .await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// POST /chats/{peer_id}
pub async fn send_message(
    session: Session,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<SendMessageRequest>,
) -> ApiResult<HttpResponse> {
    let stored = data
        .chat_server
        .send(CreateMessage {
            sender: session.user_id.clone(),
            receiver: path.into_inner(),
            message: payload.into_inner().message,
        })
        .await
        .map_err(|e| {
            error!("Chat server unavailable: {}", e);
            ApiError::Internal("Chat service unavailable".to_string())
        })??;
    Ok(HttpResponse::Ok().json(stored))
}

/// GET /chats/unread/count
pub async fn unread_count(session: Session, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let count = data
        .mongodb
        .collection::<ChatMessage>(db::CHATS)
        .count_documents(doc! { "receiver": &session.user_id, "read": false })
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "unread": count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn msg(sender: &str, receiver: &str, text: &str, mins: i64, read: bool) -> ChatMessage {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        ChatMessage {
            id: format!("{}-{}", sender, mins),
            sender: sender.into(),
            receiver: receiver.into(),
            chat_pair: chat_pair_id(sender, receiver),
            message: text.into(),
            timestamp: base + Duration::minutes(mins),
            read,
        }
    }

    #[test]
    fn conversations_sorted_by_latest_with_unread_counts() {
        let messages = vec![
            msg("rao", "asha", "Send the draft", 0, true),
            msg("asha", "rao", "Sent", 5, false),
            msg("rao", "asha", "Thanks, looks good", 10, false),
            msg("ravi", "asha", "Lab at 4?", 3, false),
            msg("ravi", "asha", "Or 5", 4, false),
        ];
        let summary = summarize_conversations("asha", &messages);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].peer_id, "rao");
        assert_eq!(summary[0].last_message, "Thanks, looks good");
        // asha's own unread outgoing message doesn't count
        assert_eq!(summary[0].unread, 1);
        assert_eq!(summary[1].peer_id, "ravi");
        assert_eq!(summary[1].unread, 2);
    }
}
