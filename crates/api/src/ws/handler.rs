use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use shelfroom_core::collaboration::{CollabMessage, Requester};
use shelfroom_core::item::ItemRef;
use shelfroom_db::repositories::RoomRepo;
use shelfroom_db::ConnectionId;
use tokio::task::JoinHandle;

use crate::state::AppState;
use crate::ws::manager::encode;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with the presence store
/// and `WsManager`, and managed by a sender task plus the receive loop.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// 1. Registers the connection with the presence store and `WsManager`.
/// 2. Spawns a sender task that forwards messages from the manager channel.
/// 3. Dispatches inbound protocol messages on the current task.
/// 4. On close, disconnects from presence, which drops every lock the
///    connection still holds.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn = match state.presence.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "Presence connect failed, dropping WebSocket");
            return;
        }
    };
    tracing::info!(conn_id = %conn, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn.clone()).await;
    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn = conn.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn, "WebSocket sink closed");
                break;
            }
        }
    });

    let mut session = SocketSession {
        state: state.clone(),
        conn: conn.clone(),
        watches: HashMap::new(),
    };
    session
        .reply(CollabMessage::SessionReady {
            connection_id: conn.to_string(),
        })
        .await;

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => session.dispatch(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    session.stop_watches();
    state.ws_manager.remove(&conn).await;
    match state.presence.disconnect(&conn).await {
        Ok(removed) => {
            tracing::info!(conn_id = %conn, locks_released = removed, "WebSocket disconnected");
        }
        Err(e) => {
            tracing::error!(conn_id = %conn, error = %e, "Presence disconnect failed");
        }
    }
    send_task.abort();
}

/// Per-socket protocol state.
struct SocketSession {
    state: AppState,
    conn: ConnectionId,
    /// Lock state forwarders, one per watched item.
    watches: HashMap<ItemRef, JoinHandle<()>>,
}

impl SocketSession {
    async fn reply(&self, message: CollabMessage) {
        if let Some(frame) = encode(&message) {
            self.state.ws_manager.send_to(&self.conn, frame).await;
        }
    }

    async fn error(&self, message: impl Into<String>) {
        self.reply(CollabMessage::Error {
            message: message.into(),
        })
        .await;
    }

    async fn dispatch(&mut self, text: &str) {
        let message = match serde_json::from_str::<CollabMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(conn_id = %self.conn, error = %e, "Unparseable WebSocket message");
                self.error(format!("Invalid message: {e}")).await;
                return;
            }
        };

        match message {
            CollabMessage::SessionIdentify {
                user_id,
                display_name,
                avatar_ref,
            } => self.identify(Requester::new(user_id, display_name, avatar_ref)).await,
            CollabMessage::RoomJoin { room_id } => self.join(&room_id).await,
            CollabMessage::LockWatch { room_id, item_id } => {
                self.watch(ItemRef::new(room_id, item_id)).await
            }
            CollabMessage::LockUnwatch { room_id, item_id } => {
                if let Some(handle) = self.watches.remove(&ItemRef::new(room_id, item_id)) {
                    handle.abort();
                }
            }
            CollabMessage::LockAcquire { room_id, item_id } => {
                self.acquire(ItemRef::new(room_id, item_id)).await
            }
            CollabMessage::LockRelease { room_id, item_id } => {
                self.release(ItemRef::new(room_id, item_id)).await
            }
            _ => self.error("Unexpected message type").await,
        }
    }

    async fn identify(&self, requester: Requester) {
        if let Err(e) = requester.validate() {
            self.error(e.to_string()).await;
            return;
        }
        tracing::debug!(conn_id = %self.conn, user_id = %requester.user_id, "Session identified");
        self.state.ws_manager.identify(&self.conn, requester).await;
    }

    async fn join(&self, room_id: &str) {
        match RoomRepo::get(self.state.documents.as_ref(), room_id).await {
            Ok(Some(_)) => {
                self.state.ws_manager.join_room(&self.conn, room_id).await;
                tracing::debug!(conn_id = %self.conn, room_id, "Joined room");
            }
            Ok(None) => self.error(format!("Room {room_id} not found")).await,
            Err(e) => {
                tracing::warn!(conn_id = %self.conn, room_id, error = %e, "Room lookup failed");
                self.error("Room could not be loaded").await;
            }
        }
    }

    async fn watch(&mut self, item: ItemRef) {
        if self.watches.contains_key(&item) {
            return;
        }
        let Some(sender) = self.state.ws_manager.sender(&self.conn).await else {
            return;
        };
        let mut watch = match self.state.locks.watch(&item).await {
            Ok(watch) => watch,
            Err(e) => {
                tracing::warn!(conn_id = %self.conn, item = %item, error = %e, "Lock watch failed");
                self.error("Lock state unavailable").await;
                return;
            }
        };

        let watched = item.clone();
        let handle = tokio::spawn(async move {
            let mut state = Some(watch.current());
            while let Some(current) = state {
                let message = CollabMessage::LockStateChanged {
                    room_id: watched.room_id.clone(),
                    item_id: watched.item_id.clone(),
                    holder: current.holder(),
                };
                let Some(frame) = encode(&message) else {
                    break;
                };
                if sender.send(frame).is_err() {
                    break;
                }
                state = watch.changed().await;
            }
        });
        self.watches.insert(item, handle);
    }

    async fn acquire(&self, item: ItemRef) {
        let Some(requester) = self.state.ws_manager.requester(&self.conn).await else {
            self.error("Identify before acquiring locks").await;
            return;
        };

        let acquired = self
            .state
            .runtime
            .acquire_lock(&self.conn, &item, &requester)
            .await;
        let outcome = match acquired {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(
                    conn_id = %self.conn,
                    item = %item,
                    error = %e,
                    "Lock request rejected"
                );
                self.reply(CollabMessage::LockDenied {
                    room_id: item.room_id,
                    item_id: item.item_id,
                    holder: None,
                    error: Some(e.to_string()),
                })
                .await;
                return;
            }
        };
        let reply = match (outcome.granted, outcome.holder) {
            (true, Some(holder)) => {
                self.state.ws_manager.track_lock(&self.conn, &item).await;
                CollabMessage::LockGranted {
                    room_id: item.room_id,
                    item_id: item.item_id,
                    holder,
                }
            }
            (_, holder) => CollabMessage::LockDenied {
                room_id: item.room_id,
                item_id: item.item_id,
                holder,
                error: outcome.error,
            },
        };
        self.reply(reply).await;
    }

    async fn release(&self, item: ItemRef) {
        let Some(requester) = self.state.ws_manager.requester(&self.conn).await else {
            self.error("Identify before releasing locks").await;
            return;
        };
        self.state
            .locks
            .release(&self.conn, &item, &requester.user_id)
            .await;
        self.state.ws_manager.untrack_lock(&self.conn, &item).await;
    }

    fn stop_watches(&mut self) {
        for (_, handle) in self.watches.drain() {
            handle.abort();
        }
    }
}
