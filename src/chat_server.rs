use crate::db::{self, MongoDB};
use crate::error::ApiError;
use crate::models::chat::chat_pair_id;
use crate::models::{new_id, ChatMessage, Notification, User};
use actix::prelude::*;
use chrono::Utc;
use log::{debug, error, info};
use mongodb::bson::doc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// What gets pushed down an open socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    Chat(ChatMessage),
    Notification(Notification),
    /// A socket request that was rejected.
    Error(String),
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct WsMessage(pub String);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub user_id: String,
    pub addr: Recipient<WsMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub user_id: String,
    pub addr: Recipient<WsMessage>,
}

/// Push an event to every open connection of one user.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver {
    pub user_id: String,
    pub event: PushEvent,
}

/// Store a direct message and push it to every open socket of both
/// participants. Both the REST and the socket transport go through here.
#[derive(Message)]
#[rtype(result = "Result<ChatMessage, ApiError>")]
pub struct CreateMessage {
    pub sender: String,
    pub receiver: String,
    pub message: String,
}

/// Trimmed message text, provided the message may be sent at all.
pub fn check_outgoing(sender: &str, receiver: &str, message: &str) -> Result<String, ApiError> {
    let text = message.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }
    if receiver.trim().is_empty() {
        return Err(ApiError::BadRequest("Recipient is required".to_string()));
    }
    if sender == receiver {
        return Err(ApiError::BadRequest("Cannot message yourself".to_string()));
    }
    Ok(text.to_string())
}

pub struct ChatServer {
    // A user may have several tabs open.
    sessions: HashMap<String, Vec<Recipient<WsMessage>>>,
    db: Arc<MongoDB>,
}

impl ChatServer {
    pub fn new(db: Arc<MongoDB>) -> Self {
        ChatServer {
            sessions: HashMap::new(),
            db,
        }
    }

    fn push(sessions: &HashMap<String, Vec<Recipient<WsMessage>>>, user_id: &str, event: &PushEvent) {
        let Some(addrs) = sessions.get(user_id) else {
            debug!("User {} has no open socket", user_id);
            return;
        };
        match serde_json::to_string(event) {
            Ok(payload) => {
                for addr in addrs {
                    addr.do_send(WsMessage(payload.clone()));
                }
            }
            Err(e) => error!("Error encoding push event: {}", e),
        }
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!("User {} connected (WS)", msg.user_id);
        self.sessions.entry(msg.user_id).or_default().push(msg.addr);
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!("User {} disconnected (WS)", msg.user_id);
        if let Some(addrs) = self.sessions.get_mut(&msg.user_id) {
            addrs.retain(|a| a != &msg.addr);
            if addrs.is_empty() {
                self.sessions.remove(&msg.user_id);
            }
        }
    }
}

impl Handler<Deliver> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Deliver, _: &mut Context<Self>) {
        Self::push(&self.sessions, &msg.user_id, &msg.event);
    }
}

impl Handler<CreateMessage> for ChatServer {
    type Result = ResponseFuture<Result<ChatMessage, ApiError>>;

    fn handle(&mut self, msg: CreateMessage, ctx: &mut Context<Self>) -> Self::Result {
        let store = self.db.clone();
        let server = ctx.address();
        Box::pin(async move {
            let text = check_outgoing(&msg.sender, &msg.receiver, &msg.message)?;
            let recipient = store
                .collection::<User>(db::USERS)
                .find_one(doc! { "_id": &msg.receiver })
                .await?;
            if recipient.is_none() {
                return Err(ApiError::NotFound("Recipient not found".to_string()));
            }

            let chat = ChatMessage {
                id: new_id(),
                chat_pair: chat_pair_id(&msg.sender, &msg.receiver),
                sender: msg.sender,
                receiver: msg.receiver,
                message: text,
                timestamp: Utc::now(),
                read: false,
            };
            store
                .collection::<ChatMessage>(db::CHATS)
                .insert_one(&chat)
                .await?;
            for user_id in [&chat.receiver, &chat.sender] {
                server.do_send(Deliver {
                    user_id: user_id.clone(),
                    event: PushEvent::Chat(chat.clone()),
                });
            }
            Ok(chat)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_text_is_trimmed() {
        assert_eq!(check_outgoing("asha", "rao", "  hello \n").unwrap(), "hello");
    }

    #[test]
    fn rejects_self_and_empty_messages() {
        assert!(matches!(
            check_outgoing("asha", "asha", "hi"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            check_outgoing("asha", "rao", "   "),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            check_outgoing("asha", "", "hi"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_value(PushEvent::Error("Recipient not found".into())).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"], "Recipient not found");
    }
}
