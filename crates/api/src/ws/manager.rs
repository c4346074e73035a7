use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use shelfroom_core::collaboration::{CollabMessage, Requester};
use shelfroom_core::item::ItemRef;
use shelfroom_core::types::{RoomId, Timestamp, UserId};
use shelfroom_db::ConnectionId;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Identity announced with `session.identify`, if any.
    pub requester: Option<Requester>,
    /// Rooms whose events are delivered to this connection.
    pub rooms: HashSet<RoomId>,
    /// Locks acquired over this connection and not yet released.
    pub held_locks: HashSet<ItemRef>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections, keyed by their presence
/// connection id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<ConnectionId, WsConnection>>,
}

/// Serialize a protocol message into a text frame.
pub fn encode(message: &CollabMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode WebSocket message");
            None
        }
    }
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn: ConnectionId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = WsConnection {
            requester: None,
            rooms: HashSet::new(),
            held_locks: HashSet::new(),
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn, entry);
        rx
    }

    /// Remove a connection by its id.
    pub async fn remove(&self, conn: &ConnectionId) {
        self.connections.write().await.remove(conn);
    }

    /// Attach an identity to a connection. Returns `false` for unknown ids.
    pub async fn identify(&self, conn: &ConnectionId, requester: Requester) -> bool {
        match self.connections.write().await.get_mut(conn) {
            Some(entry) => {
                entry.requester = Some(requester);
                true
            }
            None => false,
        }
    }

    pub async fn requester(&self, conn: &ConnectionId) -> Option<Requester> {
        self.connections
            .read()
            .await
            .get(conn)
            .and_then(|entry| entry.requester.clone())
    }

    /// Subscribe a connection to a room's events.
    pub async fn join_room(&self, conn: &ConnectionId, room_id: &str) -> bool {
        match self.connections.write().await.get_mut(conn) {
            Some(entry) => {
                entry.rooms.insert(room_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Remember that `conn` holds the lock on `item`, so the heartbeat can
    /// renew it. Returns `false` when `conn` is not a WebSocket connection.
    pub async fn track_lock(&self, conn: &ConnectionId, item: &ItemRef) -> bool {
        match self.connections.write().await.get_mut(conn) {
            Some(entry) => {
                entry.held_locks.insert(item.clone());
                true
            }
            None => false,
        }
    }

    pub async fn untrack_lock(&self, conn: &ConnectionId, item: &ItemRef) {
        if let Some(entry) = self.connections.write().await.get_mut(conn) {
            entry.held_locks.remove(item);
        }
    }

    /// Every tracked lock with the connection and user holding it.
    pub async fn held_locks(&self) -> Vec<(ConnectionId, ItemRef, UserId)> {
        let conns = self.connections.read().await;
        let mut held = Vec::new();
        for (conn, entry) in conns.iter() {
            let Some(requester) = &entry.requester else {
                continue;
            };
            for item in &entry.held_locks {
                held.push((conn.clone(), item.clone(), requester.user_id.clone()));
            }
        }
        held
    }

    /// Outbound channel of a connection, for tasks that stream to it.
    pub async fn sender(&self, conn: &ConnectionId) -> Option<WsSender> {
        self.connections
            .read()
            .await
            .get(conn)
            .map(|entry| entry.sender.clone())
    }

    /// Send a message to one connection. Returns `false` if it is gone.
    pub async fn send_to(&self, conn: &ConnectionId, message: Message) -> bool {
        match self.connections.read().await.get(conn) {
            Some(entry) => entry.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Send a message to every connection joined to `room_id`.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn send_to_room(&self, room_id: &str, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for entry in conns.values() {
            if entry.rooms.contains(room_id) && entry.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Find all connections identified as `user_id`.
    pub async fn get_by_user(&self, user_id: &str) -> Vec<ConnectionId> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, entry)| {
                entry
                    .requester
                    .as_ref()
                    .is_some_and(|r| r.user_id == user_id)
            })
            .map(|(conn, _)| conn.clone())
            .collect()
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for entry in conns.values() {
            let _ = entry.sender.send(message.clone());
        }
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for entry in conns.values() {
            let _ = entry.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for entry in conns.values() {
            let _ = entry.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
