//! Room-wide shared fields such as the track currently playing.
//!
//! Writes go straight to the room state document without any locking. Each
//! field is merged on its own, so the most recent write to a field wins and
//! there is no ordering across fields.

use std::sync::Arc;

use serde_json::{json, Value};
use shelfroom_core::error::CoreError;
use shelfroom_core::room::{validate_field_name, RoomFields};
use shelfroom_db::repositories::{RoomRepo, RoomStateRepo};
use shelfroom_db::DocumentStore;
use shelfroom_events::{event_types, EventBus, RoomEvent};

use crate::error::RoomResult;

#[derive(Clone)]
pub struct RoomStateSync {
    documents: Arc<dyn DocumentStore>,
    events: Arc<EventBus>,
}

impl RoomStateSync {
    pub fn new(documents: Arc<dyn DocumentStore>, events: Arc<EventBus>) -> Self {
        Self { documents, events }
    }

    async fn require_room(&self, room_id: &str) -> RoomResult<()> {
        RoomRepo::get(self.documents.as_ref(), room_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Room", room_id))?;
        Ok(())
    }

    pub async fn fields(&self, room_id: &str) -> RoomResult<RoomFields> {
        self.require_room(room_id).await?;
        Ok(RoomStateRepo::get(self.documents.as_ref(), room_id).await?)
    }

    pub async fn set_field(
        &self,
        room_id: &str,
        field: &str,
        value: Value,
        actor_user_id: Option<&str>,
    ) -> RoomResult<RoomFields> {
        let mut fields = RoomFields::new();
        fields.insert(field.to_string(), value);
        self.set_fields(room_id, fields, actor_user_id).await
    }

    /// Write several fields at once and return the merged state.
    pub async fn set_fields(
        &self,
        room_id: &str,
        fields: RoomFields,
        actor_user_id: Option<&str>,
    ) -> RoomResult<RoomFields> {
        if fields.is_empty() {
            return Err(CoreError::Validation("no fields to update".into()).into());
        }
        for name in fields.keys() {
            validate_field_name(name)?;
        }
        self.require_room(room_id).await?;

        let changed = fields.clone();
        let merged = RoomStateRepo::merge(self.documents.as_ref(), room_id, fields).await?;

        tracing::info!(
            room_id,
            fields = ?changed.keys().collect::<Vec<_>>(),
            user_id = actor_user_id.unwrap_or("-"),
            "Room fields updated"
        );
        let mut event = RoomEvent::new(event_types::ROOM_UPDATED, room_id)
            .with_payload(json!({ "fields": changed }));
        if let Some(actor) = actor_user_id {
            event = event.with_actor(actor);
        }
        self.events.publish(event);

        Ok(merged)
    }
}
