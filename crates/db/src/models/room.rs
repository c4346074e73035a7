use serde::Deserialize;

/// DTO for creating a room.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoom {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// DTO for joining a room's roster.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoom {
    pub display_name: String,
    #[serde(default)]
    pub avatar_ref: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}
