//! Document path layout.
//!
//! ```text
//! rooms/{room}                      Room (name, roster)
//! rooms/{room}/state                room-wide shared fields
//! rooms/{room}/shelves/{shelf}      Shelf (spots)
//! rooms/{room}/items/{item}         PlacedItem
//! ```

use shelfroom_core::error::CoreError;

/// Maximum length of a single path segment.
pub const MAX_SEGMENT_LEN: usize = 128;

pub const ROOMS: &str = "rooms";

/// Ids become path segments, so they must be non-empty and slash-free.
pub fn validate_segment(kind: &str, id: &str) -> Result<(), CoreError> {
    if id.is_empty() || id.len() > MAX_SEGMENT_LEN || id.contains('/') {
        return Err(CoreError::Validation(format!(
            "{kind} id must be 1 to {MAX_SEGMENT_LEN} bytes without '/', got '{id}'"
        )));
    }
    Ok(())
}

pub fn room(room_id: &str) -> String {
    format!("{ROOMS}/{room_id}")
}

pub fn room_state(room_id: &str) -> String {
    format!("{ROOMS}/{room_id}/state")
}

pub fn shelves(room_id: &str) -> String {
    format!("{ROOMS}/{room_id}/shelves")
}

pub fn shelf(room_id: &str, shelf_id: &str) -> String {
    format!("{ROOMS}/{room_id}/shelves/{shelf_id}")
}

pub fn items(room_id: &str) -> String {
    format!("{ROOMS}/{room_id}/items")
}

pub fn item(room_id: &str, item_id: &str) -> String {
    format!("{ROOMS}/{room_id}/items/{item_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_paths_nest_under_room() {
        assert_eq!(item("r1", "i1"), "rooms/r1/items/i1");
        assert!(item("r1", "i1").starts_with(&items("r1")));
        assert_eq!(shelf("r1", "s1"), "rooms/r1/shelves/s1");
    }

    #[test]
    fn segments_reject_slashes() {
        assert!(validate_segment("room", "r1").is_ok());
        assert!(validate_segment("room", "").is_err());
        assert!(validate_segment("room", "a/b").is_err());
        assert!(validate_segment("room", &"x".repeat(MAX_SEGMENT_LEN + 1)).is_err());
    }
}
