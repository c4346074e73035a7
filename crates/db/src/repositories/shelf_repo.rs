//! Repository for shelves and the spots they hold.

use shelfroom_core::shelf::Shelf;
use shelfroom_core::types::{new_id, ItemId};

use super::decode;
use crate::documents::{Document, DocumentError, DocumentStore};
use crate::models::shelf::CreateShelf;
use crate::paths;
use crate::tx::TxDecision;

/// Result of trying to put an item into a spot.
#[derive(Debug, Clone, PartialEq)]
pub enum SpotClaim {
    Claimed(Shelf),
    /// The spot already holds this item.
    Occupied(ItemId),
    ShelfMissing,
}

pub struct ShelfRepo;

impl ShelfRepo {
    /// Create an empty shelf. Without an explicit position the shelf goes
    /// below the existing ones.
    pub async fn create(
        store: &dyn DocumentStore,
        room_id: &str,
        input: &CreateShelf,
    ) -> Result<Shelf, DocumentError> {
        let position = match input.position {
            Some(p) => p,
            None => u32::try_from(store.list(&paths::shelves(room_id)).await?.len())
                .unwrap_or(u32::MAX),
        };
        let shelf = Shelf {
            id: new_id(),
            room_id: room_id.to_string(),
            position,
            name: input.name.trim().to_string(),
            spots: Default::default(),
            created_at: chrono::Utc::now(),
        };
        store
            .set(&paths::shelf(room_id, &shelf.id), serde_json::to_value(&shelf)?)
            .await?;
        Ok(shelf)
    }

    pub async fn get(
        store: &dyn DocumentStore,
        room_id: &str,
        shelf_id: &str,
    ) -> Result<Option<Shelf>, DocumentError> {
        store
            .get(&paths::shelf(room_id, shelf_id))
            .await?
            .map(decode)
            .transpose()
    }

    /// All shelves of a room, top to bottom.
    pub async fn list(store: &dyn DocumentStore, room_id: &str) -> Result<Vec<Shelf>, DocumentError> {
        let mut shelves: Vec<Shelf> = store
            .list(&paths::shelves(room_id))
            .await?
            .into_iter()
            .map(decode)
            .collect::<Result<_, _>>()?;
        shelves.sort_by_key(|s| s.position);
        Ok(shelves)
    }

    /// Put `item_id` into an empty spot. A spot holds at most one item, so a
    /// concurrent claim on the same spot loses with [`SpotClaim::Occupied`].
    pub async fn claim_spot(
        store: &dyn DocumentStore,
        room_id: &str,
        shelf_id: &str,
        position: u8,
        item_id: &str,
    ) -> Result<SpotClaim, DocumentError> {
        let outcome = store
            .transaction(&paths::shelf(room_id, shelf_id), &|current| {
                edit_spot(current, position, |spot| {
                    if spot.is_some() {
                        return false;
                    }
                    *spot = Some(item_id.to_string());
                    true
                })
            })
            .await?;

        let Some(doc) = outcome.value else {
            return Ok(SpotClaim::ShelfMissing);
        };
        let shelf: Shelf = decode(doc)?;
        if outcome.committed {
            return Ok(SpotClaim::Claimed(shelf));
        }
        match shelf.item_at(position) {
            Some(occupant) => Ok(SpotClaim::Occupied(occupant.clone())),
            None => Err(DocumentError::InvalidPath(format!(
                "{}#{position}",
                paths::shelf(room_id, shelf_id)
            ))),
        }
    }

    /// Empty a spot, but only if it still holds `item_id`.
    pub async fn release_spot(
        store: &dyn DocumentStore,
        room_id: &str,
        shelf_id: &str,
        position: u8,
        item_id: &str,
    ) -> Result<bool, DocumentError> {
        let outcome = store
            .transaction(&paths::shelf(room_id, shelf_id), &|current| {
                edit_spot(current, position, |spot| {
                    if spot.as_deref() == Some(item_id) {
                        *spot = None;
                        true
                    } else {
                        false
                    }
                })
            })
            .await?;
        Ok(outcome.committed)
    }
}

fn edit_spot(
    current: Option<&Document>,
    position: u8,
    edit: impl FnOnce(&mut Option<ItemId>) -> bool,
) -> TxDecision {
    let Some(doc) = current else {
        return TxDecision::Abort;
    };
    let Ok(mut shelf) = serde_json::from_value::<Shelf>(doc.body.clone()) else {
        return TxDecision::Abort;
    };
    let Some(spot) = shelf.spots.get_mut(usize::from(position)) else {
        return TxDecision::Abort;
    };
    if !edit(spot) {
        return TxDecision::Abort;
    }
    match serde_json::to_value(&shelf) {
        Ok(body) => TxDecision::Set(body),
        Err(_) => TxDecision::Abort,
    }
}
