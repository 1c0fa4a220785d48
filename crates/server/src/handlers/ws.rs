// WebSocket handler for the chat room
// Every connected client shares one broadcast channel

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};

use crate::{
    error::AppError,
    middleware::auth::Session,
    services::chat::{self, ChatEvent},
    AppState,
};

const ROOM_CAPACITY: usize = 256;

// Room state for broadcasting chat events
pub struct ChatRoom {
    broadcast: broadcast::Sender<ChatEvent>,
}

impl ChatRoom {
    pub fn new() -> Self {
        let (broadcast, _) = broadcast::channel(ROOM_CAPACITY);
        Self { broadcast }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.broadcast.subscribe()
    }

    /// Fire-and-forget; an empty room drops the event.
    pub fn publish(&self, event: ChatEvent) {
        let _ = self.broadcast.send(event);
    }
}

impl Default for ChatRoom {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedChatRoom = Arc<ChatRoom>;

pub fn create_chat_room() -> SharedChatRoom {
    Arc::new(ChatRoom::new())
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    message: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    session: Session,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, session, state))
}

async fn handle_socket(socket: WebSocket, session: Session, state: AppState) {
    let (sender, mut receiver) = socket.split();

    let room = state.chat.clone();
    let mut broadcast_rx = room.subscribe();

    tracing::debug!(username = %session.username, "Chat client connected");
    room.publish(ChatEvent::joined(&session.username, session.is_admin));

    // Sender wrapped in Arc<Mutex> for sharing
    let sender = Arc::new(Mutex::new(sender));
    let sender_clone = sender.clone();

    // Task to forward room events to this client
    let broadcast_task = tokio::spawn(async move {
        loop {
            let event = match broadcast_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Chat client lagging, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            let mut sender = sender_clone.lock().await;
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Persist incoming messages and broadcast them to the room
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let Ok(incoming) = serde_json::from_str::<IncomingMessage>(&text) else {
                    tracing::debug!(username = %session.username, "Ignoring malformed chat frame");
                    continue;
                };

                match chat::post_message(
                    &state.db.pool,
                    &session.username,
                    &incoming.message,
                    session.is_admin,
                    Utc::now(),
                )
                .await
                {
                    Ok(stored) => room.publish(stored.into()),
                    Err(AppError::Validation(reason)) => {
                        tracing::debug!(username = %session.username, %reason, "Chat message rejected");
                    }
                    Err(err) => {
                        tracing::error!(username = %session.username, "Failed to store chat message: {}", err);
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(data) => {
                let mut sender = sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    broadcast_task.abort();
    room.publish(ChatEvent::left(&session.username, session.is_admin));
    tracing::debug!(username = %session.username, "Chat client disconnected");
}
