//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&dyn DocumentStore` as the first argument.

pub mod placed_item_repo;
pub mod room_repo;
pub mod room_state_repo;
pub mod shelf_repo;

pub use placed_item_repo::{ItemDataWrite, PlacedItemRepo};
pub use room_repo::RoomRepo;
pub use room_state_repo::RoomStateRepo;
pub use shelf_repo::{ShelfRepo, SpotClaim};

use serde::de::DeserializeOwned;

use crate::documents::{Document, DocumentError};

/// Deserialize a document body into a domain type.
pub(crate) fn decode<T: DeserializeOwned>(doc: Document) -> Result<T, DocumentError> {
    Ok(serde_json::from_value(doc.body)?)
}
