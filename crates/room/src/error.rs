use shelfroom_core::error::CoreError;
use shelfroom_db::{DocumentError, PresenceError};

/// Error type for the room services.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Presence(#[from] PresenceError),
}

pub type RoomResult<T> = Result<T, RoomError>;
