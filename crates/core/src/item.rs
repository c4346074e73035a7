//! Placed items and their opaque, item-type-specific data blob.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::shelf::SPOTS_PER_SHELF;
use crate::types::{ItemId, RoomId, ShelfId, Timestamp, UserId};

/// Item-type-specific state. Opaque to everything except the item's behavior.
pub type ItemData = Map<String, Value>;

/// An item occupying one spot of a shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedItem {
    pub id: ItemId,
    pub room_id: RoomId,
    pub shelf_id: ShelfId,
    pub position: u8,
    pub item_type_id: String,
    /// Owner: the user who filled the spot.
    pub placed_user_id: UserId,
    pub item_data: ItemData,
    /// Incremented on every write to `item_data`.
    #[serde(default)]
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PlacedItem {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.room_id.clone(), self.id.clone())
    }
}

/// Room-qualified reference to a placed item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub room_id: RoomId,
    pub item_id: ItemId,
}

impl ItemRef {
    pub fn new(room_id: impl Into<RoomId>, item_id: impl Into<ItemId>) -> Self {
        Self {
            room_id: room_id.into(),
            item_id: item_id.into(),
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.room_id, self.item_id)
    }
}

/// Merge `partial` into `data`, top-level keys only. Later keys replace
/// earlier ones wholesale; nested objects are not merged.
pub fn merge_item_data(data: &mut ItemData, partial: &ItemData) {
    for (key, value) in partial {
        data.insert(key.clone(), value.clone());
    }
}

/// Interpret a JSON value as a partial item-data update.
pub fn partial_from_value(value: Value) -> Result<ItemData, CoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::Validation(format!(
            "item data update must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Validate a spot position (0-based).
pub fn validate_position(position: u8) -> Result<(), CoreError> {
    if usize::from(position) < SPOTS_PER_SHELF {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "position must be between 0 and {}, got {position}",
            SPOTS_PER_SHELF - 1
        )))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
