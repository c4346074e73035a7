//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfroom_core::types::{ItemId, RoomId, UserId};
use tokio::sync::broadcast;

/// Event names published by the room services.
pub mod event_types {
    pub const ITEM_PLACED: &str = "item.placed";
    pub const ITEM_UPDATED: &str = "item.updated";
    pub const ITEM_REMOVED: &str = "item.removed";
    pub const ROOM_UPDATED: &str = "room.updated";
    pub const ROSTER_CHANGED: &str = "room.roster_changed";
    pub const SHELF_CREATED: &str = "shelf.created";
}

// ---------------------------------------------------------------------------
// RoomEvent
// ---------------------------------------------------------------------------

/// Something that happened inside a room.
///
/// Constructed via [`RoomEvent::new`] and enriched with
/// [`with_item`](RoomEvent::with_item), [`with_actor`](RoomEvent::with_actor)
/// and [`with_payload`](RoomEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Dot-separated event name, e.g. `"item.placed"`.
    pub event_type: String,

    pub room_id: RoomId,

    pub item_id: Option<ItemId>,

    /// User whose action produced the event.
    pub actor_user_id: Option<UserId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl RoomEvent {
    pub fn new(event_type: impl Into<String>, room_id: impl Into<RoomId>) -> Self {
        Self {
            event_type: event_type.into(),
            room_id: room_id.into(),
            item_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_item(mut self, item_id: impl Into<ItemId>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_actor(mut self, user_id: impl Into<UserId>) -> Self {
        self.actor_user_id = Some(user_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use shelfroom_events::bus::{EventBus, RoomEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(RoomEvent::new("room.updated", "r1"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is subscribed.
    pub fn publish(&self, event: RoomEvent) {
        tracing::trace!(
            event_type = %event.event_type,
            room_id = %event.room_id,
            "Publishing room event"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
