//! Shelf grid service: loads a shelf with its items and lock states, renders
//! the spots for one viewer, and carries out taps.

use serde::Serialize;
use shelfroom_core::collaboration::{
    HolderInfo, LockRecord, LockState, Requester, OPEN_FAILED_MESSAGE,
};
use shelfroom_core::error::CoreError;
use shelfroom_core::item::{validate_position, ItemRef, PlacedItem};
use shelfroom_core::room::{Room, RosterEntry};
use shelfroom_core::shelf::{
    render_spots, resolve_overlay, route_press, LockOverlay, PressRoute, Shelf, SpotRenderInput,
    SpotView, SPOTS_PER_SHELF,
};
use shelfroom_core::types::{RoomId, ShelfId};
use shelfroom_db::repositories::{PlacedItemRepo, RoomRepo, ShelfRepo};
use shelfroom_db::ConnectionId;

use crate::error::RoomResult;
use crate::runtime::{ActiveItem, ItemRuntime, OpenOutcome};

/// One shelf as a specific viewer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShelfView {
    pub room_id: RoomId,
    pub shelf_id: ShelfId,
    pub name: String,
    pub position: u32,
    pub spots: Vec<SpotView>,
}

/// What came of a tap on a spot.
#[derive(Debug)]
pub enum PressOutcome {
    /// Empty spot: show item selection for this position.
    PickItem { position: u8 },
    Opened(ActiveItem),
    /// Someone else has the item open.
    Blocked(LockOverlay),
    /// The item could not be opened; show the message on the spot.
    Failed(String),
    Ignored,
}

#[derive(Clone)]
pub struct ShelfGrid {
    runtime: ItemRuntime,
}

struct LoadedShelf {
    room: Room,
    shelf: Shelf,
    items: [Option<PlacedItem>; SPOTS_PER_SHELF],
}

impl ShelfGrid {
    pub fn new(runtime: ItemRuntime) -> Self {
        Self { runtime }
    }

    async fn load(&self, room_id: &str, shelf_id: &str) -> RoomResult<LoadedShelf> {
        let store = self.runtime.documents().as_ref();
        let room = RoomRepo::get(store, room_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Room", room_id))?;
        let shelf = ShelfRepo::get(store, room_id, shelf_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Shelf", shelf_id))?;

        let mut items: [Option<PlacedItem>; SPOTS_PER_SHELF] = Default::default();
        for (slot, item_id) in items.iter_mut().zip(shelf.spots.iter()) {
            if let Some(item_id) = item_id {
                *slot = PlacedItemRepo::get(store, room_id, item_id).await?;
            }
        }
        Ok(LoadedShelf { room, shelf, items })
    }

    /// Lock state for a spot. Only lockable items are looked up; a failed
    /// lookup renders as unlocked.
    async fn lock_state(&self, item: Option<&PlacedItem>) -> LockState {
        let Some(item) = item.filter(|i| self.runtime.should_lock(&i.item_type_id)) else {
            return LockState::Unlocked;
        };
        match self.runtime.locks().state(&item.item_ref()).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, item_id = %item.id, "Lock state unavailable");
                LockState::Unlocked
            }
        }
    }

    /// Render a shelf for `viewer_id`.
    pub async fn view(
        &self,
        room_id: &str,
        shelf_id: &str,
        viewer_id: &str,
        show_affordances: bool,
    ) -> RoomResult<ShelfView> {
        let loaded = self.load(room_id, shelf_id).await?;

        let mut locks: [LockState; SPOTS_PER_SHELF] = Default::default();
        for (lock, item) in locks.iter_mut().zip(loaded.items.iter()) {
            *lock = self.lock_state(item.as_ref()).await;
        }

        let info = loaded.room.info();
        let input = SpotRenderInput {
            viewer_id,
            roster: &loaded.room.roster,
            registry: self.runtime.registry(),
            room: &info,
            show_affordances,
        };
        Ok(ShelfView {
            room_id: loaded.shelf.room_id.clone(),
            shelf_id: loaded.shelf.id.clone(),
            name: loaded.shelf.name.clone(),
            position: loaded.shelf.position,
            spots: render_spots(&loaded.items, &locks, &input),
        })
    }

    /// Handle a tap on spot `position` by `requester` over connection `conn`.
    ///
    /// A missing room or shelf is an error. Everything that goes wrong while
    /// opening the item becomes [`PressOutcome::Failed`].
    pub async fn press(
        &self,
        conn: &ConnectionId,
        room_id: &str,
        shelf_id: &str,
        position: u8,
        requester: &Requester,
        show_affordances: bool,
    ) -> RoomResult<PressOutcome> {
        validate_position(position)?;
        let loaded = self.load(room_id, shelf_id).await?;
        let item = loaded.items[usize::from(position)].as_ref();

        let lock = match item.filter(|i| self.runtime.should_lock(&i.item_type_id)) {
            Some(item) => match self.runtime.locks().state(&item.item_ref()).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(error = %e, item_id = %item.id, "Lock state unavailable");
                    return Ok(PressOutcome::Failed(OPEN_FAILED_MESSAGE.to_string()));
                }
            },
            None => LockState::Unlocked,
        };

        let route = route_press(
            position,
            item,
            &lock,
            &requester.user_id,
            &loaded.room.roster,
            show_affordances,
        );
        let item_id = match route {
            PressRoute::PickItem { position } => return Ok(PressOutcome::PickItem { position }),
            PressRoute::Blocked { overlay } => return Ok(PressOutcome::Blocked(overlay)),
            PressRoute::Ignore => return Ok(PressOutcome::Ignored),
            PressRoute::Acquire { item_id } | PressRoute::Open { item_id } => item_id,
        };

        let item_ref = ItemRef::new(room_id, item_id);
        match self.runtime.open(conn, &item_ref, requester).await {
            Ok(OpenOutcome::Opened(active)) => Ok(PressOutcome::Opened(active)),
            Ok(OpenOutcome::Denied(outcome)) => match (outcome.error, outcome.holder) {
                (None, Some(holder)) => Ok(PressOutcome::Blocked(holder_overlay(
                    &holder,
                    &loaded.room.roster,
                ))),
                (error, _) => {
                    tracing::debug!(item = %item_ref, ?error, "Item could not be opened");
                    Ok(PressOutcome::Failed(OPEN_FAILED_MESSAGE.to_string()))
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, item = %item_ref, "Item could not be opened");
                Ok(PressOutcome::Failed(OPEN_FAILED_MESSAGE.to_string()))
            }
        }
    }
}

/// Overlay for a holder reported by a denied acquire.
fn holder_overlay(holder: &HolderInfo, roster: &[RosterEntry]) -> LockOverlay {
    let record = LockRecord {
        holder_user_id: holder.user_id.clone(),
        holder_display_name: holder.display_name.clone(),
        holder_avatar_ref: holder.avatar_ref.clone(),
        acquired_at_millis: holder.acquired_at_millis,
        renewed_at_millis: None,
        holder_connection_id: None,
    };
    resolve_overlay(&record, roster)
}
