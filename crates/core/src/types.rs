/// Room identifiers are opaque strings chosen at room creation.
pub type RoomId = String;

/// Shelf identifiers are unique within a room.
pub type ShelfId = String;

/// Placed item identifiers are unique within a room.
pub type ItemId = String;

/// User identifiers come from the identity provider unchanged.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Milliseconds since the Unix epoch, as stored in presence records.
pub type Millis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a new time-ordered identifier for rooms, shelves and items.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
