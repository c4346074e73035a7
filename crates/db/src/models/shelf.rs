use serde::Deserialize;

/// DTO for adding a shelf to a room.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateShelf {
    pub name: String,
    /// Defaults to below the last existing shelf.
    #[serde(default)]
    pub position: Option<u32>,
}
