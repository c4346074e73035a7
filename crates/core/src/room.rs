//! Rooms, their member roster, and room-wide shared fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{RoomId, Timestamp, UserId};

/// Maximum length of a display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Maximum length of a room-wide field name.
pub const MAX_FIELD_NAME_LEN: usize = 64;

/// Well-known room-wide fields.
pub mod fields {
    /// The audio track currently playing in the room.
    pub const NOW_PLAYING: &str = "now_playing";
}

/// Room-wide scalar fields. Each key is written independently with
/// last-writer-wins semantics.
pub type RoomFields = Map<String, Value>;

/// One member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
    pub created_at: Timestamp,
}

impl Room {
    pub fn member(&self, user_id: &str) -> Option<&RosterEntry> {
        self.roster.iter().find(|m| m.user_id == user_id)
    }

    /// Summary handed to item behaviors when rendering.
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id.clone(),
            name: self.name.clone(),
            member_count: self.roster.len(),
        }
    }
}

/// The slice of room context item behaviors may use while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    pub member_count: usize,
}

pub fn validate_display_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("display name must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Field names become document keys, so path separators are not allowed.
pub fn validate_field_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation("field name must not be empty".into()));
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "field name must be at most {MAX_FIELD_NAME_LEN} bytes"
        )));
    }
    if name.contains('/') || name.contains('.') {
        return Err(CoreError::Validation(format!(
            "field name '{name}' must not contain '/' or '.'"
        )));
    }
    Ok(())
}
