//! Shelf layout, spot rendering, and tap routing.
//!
//! Everything here is pure: the room services load the shelf, its items and
//! the current lock states, and hand them to [`render_spots`] and
//! [`route_press`].

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::behavior::{ItemRegistry, ItemView, RenderContext, RenderMode};
use crate::catalog;
use crate::collaboration::{LockRecord, LockState};
use crate::item::PlacedItem;
use crate::room::{RoomInfo, RosterEntry};
use crate::types::{ItemId, RoomId, ShelfId, Timestamp, UserId};

/// Number of spots on every shelf.
pub const SPOTS_PER_SHELF: usize = 3;

/// Maximum shelf name length, in characters.
pub const MAX_SHELF_NAME_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: ShelfId,
    pub room_id: RoomId,
    /// Vertical order of the shelf within the room.
    pub position: u32,
    pub name: String,
    /// Item id occupying each spot, if any.
    pub spots: [Option<ItemId>; SPOTS_PER_SHELF],
    pub created_at: Timestamp,
}

impl Shelf {
    pub fn item_at(&self, position: u8) -> Option<&ItemId> {
        self.spots.get(usize::from(position)).and_then(Option::as_ref)
    }
}

// ---------------------------------------------------------------------------
// Overlays
// ---------------------------------------------------------------------------

/// Blocking indicator drawn over a spot held by someone else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOverlay {
    pub holder_user_id: UserId,
    pub label: String,
    pub avatar_ref: Option<String>,
    /// `false` when the holder has left the room and the record's own
    /// snapshot was used instead.
    pub from_roster: bool,
}

/// Resolve a lock holder to a friendly label, preferring the live roster and
/// falling back to the identity snapshotted into the record.
pub fn resolve_overlay(record: &LockRecord, roster: &[RosterEntry]) -> LockOverlay {
    match roster.iter().find(|m| m.user_id == record.holder_user_id) {
        Some(member) => LockOverlay {
            holder_user_id: record.holder_user_id.clone(),
            label: member.display_name.clone(),
            avatar_ref: member
                .avatar_ref
                .clone()
                .or_else(|| record.holder_avatar_ref.clone()),
            from_roster: true,
        },
        None => LockOverlay {
            holder_user_id: record.holder_user_id.clone(),
            label: record.holder_display_name.clone(),
            avatar_ref: record.holder_avatar_ref.clone(),
            from_roster: false,
        },
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// What the viewer sees in one spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpotView {
    Empty {
        position: u8,
        /// Show the "add" affordance.
        can_add: bool,
    },
    Occupied {
        position: u8,
        item_id: ItemId,
        item: ItemView,
        should_lock: bool,
        locked_by_viewer: bool,
        /// Present when another user holds the lock. Taps are no-ops.
        overlay: Option<LockOverlay>,
    },
}

impl SpotView {
    pub fn position(&self) -> u8 {
        match self {
            Self::Empty { position, .. } | Self::Occupied { position, .. } => *position,
        }
    }

    pub fn overlay(&self) -> Option<&LockOverlay> {
        match self {
            Self::Occupied { overlay, .. } => overlay.as_ref(),
            Self::Empty { .. } => None,
        }
    }
}

/// Shared inputs for rendering the spots of one shelf.
#[derive(Debug, Clone, Copy)]
pub struct SpotRenderInput<'a> {
    pub viewer_id: &'a str,
    pub roster: &'a [RosterEntry],
    pub registry: &'a ItemRegistry,
    pub room: &'a RoomInfo,
    pub show_affordances: bool,
}

/// Render one spot. Occupied spots always render the item inactive.
pub fn render_spot(
    position: u8,
    item: Option<&PlacedItem>,
    lock: &LockState,
    input: &SpotRenderInput<'_>,
) -> SpotView {
    let Some(item) = item else {
        return SpotView::Empty {
            position,
            can_add: input.show_affordances,
        };
    };

    let view = match input.registry.get(&item.item_type_id) {
        Some(behavior) => behavior.render_inactive(&RenderContext {
            item_data: &item.item_data,
            room: input.room,
            is_active: false,
        }),
        None => ItemView::new(
            &item.item_type_id,
            RenderMode::Inactive,
            "Unknown item",
            json!({}),
        ),
    };

    let should_lock = catalog::find(&item.item_type_id).is_some_and(|c| c.should_lock);
    let overlay = match lock.record() {
        Some(record) if should_lock && !record.is_held_by(input.viewer_id) => {
            Some(resolve_overlay(record, input.roster))
        }
        _ => None,
    };

    SpotView::Occupied {
        position,
        item_id: item.id.clone(),
        item: view,
        should_lock,
        locked_by_viewer: should_lock && lock.is_locked_by(input.viewer_id),
        overlay,
    }
}

/// Render all spots of a shelf.
pub fn render_spots(
    items: &[Option<PlacedItem>; SPOTS_PER_SHELF],
    locks: &[LockState; SPOTS_PER_SHELF],
    input: &SpotRenderInput<'_>,
) -> Vec<SpotView> {
    items
        .iter()
        .zip(locks.iter())
        .enumerate()
        .map(|(i, (item, lock))| {
            // SPOTS_PER_SHELF fits in u8.
            let position = i as u8;
            render_spot(position, item.as_ref(), lock, input)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tap routing
// ---------------------------------------------------------------------------

/// What a tap on a spot should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressRoute {
    /// Empty spot with affordances: open item selection.
    PickItem { position: u8 },
    /// Lockable item, unlocked or already held by the viewer.
    Acquire { item_id: ItemId },
    /// Non-lockable item: open directly.
    Open { item_id: ItemId },
    /// Held by someone else. Nothing happens.
    Blocked { overlay: LockOverlay },
    Ignore,
}

pub fn route_press(
    position: u8,
    item: Option<&PlacedItem>,
    lock: &LockState,
    viewer_id: &str,
    roster: &[RosterEntry],
    show_affordances: bool,
) -> PressRoute {
    let Some(item) = item else {
        return if show_affordances {
            PressRoute::PickItem { position }
        } else {
            PressRoute::Ignore
        };
    };

    let Some(entry) = catalog::find(&item.item_type_id) else {
        return PressRoute::Ignore;
    };

    if !entry.should_lock {
        return PressRoute::Open {
            item_id: item.id.clone(),
        };
    }

    match lock.record() {
        Some(record) if !record.is_held_by(viewer_id) => PressRoute::Blocked {
            overlay: resolve_overlay(record, roster),
        },
        _ => PressRoute::Acquire {
            item_id: item.id.clone(),
        },
    }
}

pub fn validate_shelf_name(name: &str) -> Result<(), crate::error::CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_SHELF_NAME_LEN {
        return Err(crate::error::CoreError::Validation(format!(
            "shelf name must be 1 to {MAX_SHELF_NAME_LEN} characters"
        )));
    }
    Ok(())
}
