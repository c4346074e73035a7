//! Item catalog: immutable reference data for every placeable item type.
//!
//! The catalog is the single source of truth for `should_lock`, the flag that
//! decides whether opening an item goes through the lock protocol.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Known item type ids.
pub mod item_types {
    pub const CLOCK: &str = "clock";
    pub const PLANT: &str = "plant";
    pub const PET: &str = "pet";
    pub const SKETCHPAD: &str = "sketchpad";
    pub const GUESTBOOK: &str = "guestbook";
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub item_type_id: &'static str,
    pub display_name: &'static str,
    pub image_ref: &'static str,
    pub cost: u32,
    /// When `true`, only one user at a time may open the interactive view.
    pub should_lock: bool,
}

/// Owned form of [`CatalogItem`] for API payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_type_id: String,
    pub display_name: String,
    pub image_ref: String,
    pub cost: u32,
    pub should_lock: bool,
}

impl From<&CatalogItem> for CatalogEntry {
    fn from(item: &CatalogItem) -> Self {
        Self {
            item_type_id: item.item_type_id.to_string(),
            display_name: item.display_name.to_string(),
            image_ref: item.image_ref.to_string(),
            cost: item.cost,
            should_lock: item.should_lock,
        }
    }
}

pub static CLOCK: CatalogItem = CatalogItem {
    item_type_id: item_types::CLOCK,
    display_name: "Wall Clock",
    image_ref: "items/clock.png",
    cost: 0,
    should_lock: false,
};

pub static PLANT: CatalogItem = CatalogItem {
    item_type_id: item_types::PLANT,
    display_name: "Potted Plant",
    image_ref: "items/plant.png",
    cost: 40,
    should_lock: true,
};

pub static PET: CatalogItem = CatalogItem {
    item_type_id: item_types::PET,
    display_name: "Room Pet",
    image_ref: "items/pet.png",
    cost: 120,
    should_lock: true,
};

pub static SKETCHPAD: CatalogItem = CatalogItem {
    item_type_id: item_types::SKETCHPAD,
    display_name: "Sketchpad",
    image_ref: "items/sketchpad.png",
    cost: 60,
    should_lock: true,
};

pub static GUESTBOOK: CatalogItem = CatalogItem {
    item_type_id: item_types::GUESTBOOK,
    display_name: "Guestbook",
    image_ref: "items/guestbook.png",
    cost: 25,
    should_lock: false,
};

/// Every item type that can be placed, in shop order.
pub static CATALOG: &[&CatalogItem] = &[&CLOCK, &PLANT, &PET, &SKETCHPAD, &GUESTBOOK];

/// Look up a catalog entry by item type id.
pub fn find(item_type_id: &str) -> Option<&'static CatalogItem> {
    CATALOG
        .iter()
        .copied()
        .find(|item| item.item_type_id == item_type_id)
}

/// Look up a catalog entry, failing with `NotFound` for unknown types.
pub fn require(item_type_id: &str) -> Result<&'static CatalogItem, CoreError> {
    find(item_type_id).ok_or_else(|| CoreError::not_found("ItemType", item_type_id))
}
