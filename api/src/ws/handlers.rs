//! The single WebSocket endpoint.
//!
//! A connected socket can watch any number of ticket rooms at once. Staff
//! sockets are additionally subscribed to the shared staff room for the whole
//! connection. Each watched room gets a pump task forwarding broadcasts into
//! one writer task, so room fan-out never blocks the read loop.

use std::collections::HashMap;

use axum::{
    Extension,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use util::state::AppState;
use util::ws::{staff_room, ticket_room};

use crate::auth::claims::{AuthUser, Claims};
use crate::services::dispatcher::dispatch_effects;
use crate::services::notify::notifier;
use crate::services::tickets::{
    self, PostMessage, PostOutcome, ServiceContext, ServiceError,
};

/// Frames clients may send.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsIn {
    JoinTicket {
        ticket_id: i64,
    },
    LeaveTicket {
        ticket_id: i64,
    },
    SendMessage {
        ticket_id: i64,
        body: String,
        #[serde(default)]
        dedup_key: Option<String>,
    },
    Ping,
}

/// Direct (non-broadcast) replies to the sending socket.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsOut {
    Joined { room: String },
    Left { room: String },
    MessageAck { ticket_id: i64, duplicate: bool },
    Pong,
    Error { message: String },
}

/// Upgrade handler. The `allow_authenticated` route layer has already
/// rejected anonymous requests with a 401 before the upgrade happens.
pub async fn ticket_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve(socket, app_state, claims))
}

async fn serve(socket: WebSocket, state: AppState, claims: Claims) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel::<String>(64);
    let writer = spawn_writer(sink, rx);

    // room name -> pump task forwarding that room's broadcasts to this socket
    let mut pumps: HashMap<String, JoinHandle<()>> = HashMap::new();

    if claims.role.is_staff() {
        join_room(&state, &tx, &mut pumps, staff_room().to_string(), claims.sub).await;
    }

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                handle_frame(&state, &claims, &tx, &mut pumps, text.as_str()).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    for (room, pump) in pumps {
        state.ws().unregister(&room, claims.sub).await;
        pump.abort();
    }
    writer.abort();
    debug!(user = claims.sub, "WebSocket closed");
}

fn spawn_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Subscribes this socket to `room` and registers presence. Idempotent per
/// room: a second join on the same socket is a no-op.
async fn join_room(
    state: &AppState,
    tx: &mpsc::Sender<String>,
    pumps: &mut HashMap<String, JoinHandle<()>>,
    room: String,
    user_id: i64,
) {
    if pumps.contains_key(&room) {
        return;
    }

    let mut receiver = state.ws().subscribe(&room).await;
    state.ws().register(&room, user_id).await;

    let tx = tx.clone();
    let pump = tokio::spawn(async move {
        while let Ok(msg) = receiver.recv().await {
            if tx.send(msg).await.is_err() {
                break;
            }
        }
    });
    pumps.insert(room, pump);
}

async fn leave_room(
    state: &AppState,
    pumps: &mut HashMap<String, JoinHandle<()>>,
    room: &str,
    user_id: i64,
) {
    if let Some(pump) = pumps.remove(room) {
        state.ws().unregister(room, user_id).await;
        pump.abort();
    }
}

async fn handle_frame(
    state: &AppState,
    claims: &Claims,
    tx: &mpsc::Sender<String>,
    pumps: &mut HashMap<String, JoinHandle<()>>,
    raw: &str,
) {
    let frame = match serde_json::from_str::<WsIn>(raw) {
        Ok(frame) => frame,
        Err(_) => {
            send(tx, &WsOut::Error {
                message: "Unrecognized frame".into(),
            })
            .await;
            return;
        }
    };

    let ctx = ServiceContext::new(claims.sub, claims.role);

    match frame {
        WsIn::JoinTicket { ticket_id } => {
            match tickets::authorize_ticket_access(state.db(), ctx, ticket_id).await {
                Ok(_) => {
                    let room = ticket_room(ticket_id);
                    join_room(state, tx, pumps, room.clone(), claims.sub).await;
                    send(tx, &WsOut::Joined { room }).await;
                }
                Err(e) => send_error(tx, e).await,
            }
        }
        WsIn::LeaveTicket { ticket_id } => {
            let room = ticket_room(ticket_id);
            leave_room(state, pumps, &room, claims.sub).await;
            send(tx, &WsOut::Left { room }).await;
        }
        WsIn::SendMessage {
            ticket_id,
            body,
            dedup_key,
        } => {
            let input = PostMessage {
                ticket_id,
                body: Some(body),
                attachments: Vec::new(),
                dedup_key,
            };
            match tickets::post_message(state.db(), state.dedup(), ctx, input).await {
                Ok(PostOutcome::Posted { effects, .. }) => {
                    dispatch_effects(state, notifier().as_ref(), effects).await;
                    send(tx, &WsOut::MessageAck {
                        ticket_id,
                        duplicate: false,
                    })
                    .await;
                }
                Ok(PostOutcome::Duplicate) => {
                    send(tx, &WsOut::MessageAck {
                        ticket_id,
                        duplicate: true,
                    })
                    .await;
                }
                Err(e) => send_error(tx, e).await,
            }
        }
        WsIn::Ping => send(tx, &WsOut::Pong).await,
    }
}

async fn send(tx: &mpsc::Sender<String>, out: &WsOut) {
    if let Ok(json) = serde_json::to_string(out) {
        let _ = tx.send(json).await;
    }
}

async fn send_error(tx: &mpsc::Sender<String>, e: ServiceError) {
    send(tx, &WsOut::Error {
        message: e.to_string(),
    })
    .await;
}
