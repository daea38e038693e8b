use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, error, warn};
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::app_state::AppState;
use crate::chat_server::{ChatServer, Connect, CreateMessage, Disconnect, PushEvent, WsMessage};
use crate::error::ApiError;
use crate::session::validate_jwt;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct IncomingMessage {
    receiver: String,
    message: String,
}

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub struct WebSocketConnection {
    pub user_id: String,
    pub hb: Instant,
    pub addr: Addr<ChatServer>,
}

impl Actor for WebSocketConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.addr.do_send(Connect {
            user_id: self.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.addr.do_send(Disconnect {
            user_id: self.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl WebSocketConnection {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("WebSocket heartbeat failed for {}, disconnecting", act.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<IncomingMessage>(&text) {
                Ok(incoming) => {
                    // The stored message reaches this socket through `Deliver`,
                    // along with every other tab of both participants.
                    self.addr
                        .send(CreateMessage {
                            sender: self.user_id.clone(),
                            receiver: incoming.receiver,
                            message: incoming.message,
                        })
                        .into_actor(self)
                        .then(|res, act, ctx| {
                            let rejected = match res {
                                Ok(Ok(_)) => None,
                                Ok(Err(e)) => {
                                    debug!("Chat message from {} rejected: {}", act.user_id, e);
                                    Some(e.to_string())
                                }
                                Err(e) => {
                                    error!("Chat server unavailable: {}", e);
                                    Some("Chat service unavailable".to_string())
                                }
                            };
                            if let Some(reason) = rejected {
                                if let Ok(json) = serde_json::to_string(&PushEvent::Error(reason)) {
                                    ctx.text(json);
                                }
                            }
                            fut::ready(())
                        })
                        .wait(ctx);
                }
                Err(e) => warn!("Failed to parse message: {}", e),
            },
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<WsMessage> for WebSocketConnection {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// GET /ws?token=<jwt>
///
/// Browsers cannot set headers on a WebSocket upgrade, so the token travels
/// in the query string.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, Error> {
    let claims = validate_jwt(&query.token, &state.config.jwt_secret).map_err(ApiError::from)?;
    ws::start(
        WebSocketConnection {
            user_id: claims.sub,
            hb: Instant::now(),
            addr: state.chat_server.clone(),
        },
        &req,
        stream,
    )
}
