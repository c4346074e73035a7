//! Delivers room events from the [`EventBus`](shelfroom_events::EventBus)
//! to the WebSocket connections joined to each event's room.

use std::sync::Arc;

use shelfroom_core::collaboration::CollabMessage;
use shelfroom_events::RoomEvent;
use tokio::sync::broadcast;

use crate::ws::manager::{encode, WsManager};

pub struct RoomEventFanout {
    ws_manager: Arc<WsManager>,
}

impl RoomEventFanout {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the event bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<RoomEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.deliver(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Room event fan-out lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, room event fan-out shutting down");
                    break;
                }
            }
        }
    }

    async fn deliver(&self, event: &RoomEvent) {
        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, event_type = %event.event_type, "Failed to encode room event");
                return;
            }
        };
        let message = CollabMessage::RoomEvent {
            event_type: event.event_type.clone(),
            room_id: event.room_id.clone(),
            payload,
        };
        let Some(frame) = encode(&message) else {
            return;
        };
        let delivered = self.ws_manager.send_to_room(&event.room_id, frame).await;
        tracing::trace!(
            event_type = %event.event_type,
            room_id = %event.room_id,
            delivered,
            "Room event delivered"
        );
    }
}
