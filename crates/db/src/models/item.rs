use serde::Deserialize;
use serde_json::Value;

/// DTO for filling an empty spot.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceItem {
    pub item_type_id: String,
}

/// DTO for a partial `item_data` update.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemData {
    /// Top-level keys to merge into the item's data.
    pub data: Value,
    /// When set, the write is rejected unless the item is still at this
    /// version.
    #[serde(default)]
    pub expected_version: Option<i64>,
}
