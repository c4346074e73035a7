//! Item runtime: places and removes items, and hosts the open/update/close
//! lifecycle of one item on behalf of one user.
//!
//! Behaviors are resolved from the [`ItemRegistry`] by item type id. The
//! runtime owns persistence and locking; behaviors own the shape of
//! `item_data` and the views.

use std::sync::Arc;

use serde_json::{json, Value};
use shelfroom_core::behavior::{ItemBehavior, ItemRegistry, ItemView, RenderContext};
use shelfroom_core::collaboration::{AcquireOutcome, Requester};
use shelfroom_core::error::CoreError;
use shelfroom_core::item::{
    merge_item_data, partial_from_value, validate_position, ItemData, ItemRef, PlacedItem,
};
use shelfroom_core::room::RoomInfo;
use shelfroom_core::types::new_id;
use shelfroom_db::repositories::{ItemDataWrite, PlacedItemRepo, ShelfRepo, SpotClaim};
use shelfroom_db::{ConnectionId, DocumentStore};
use shelfroom_events::{event_types, EventBus, RoomEvent};

use crate::error::{RoomError, RoomResult};
use crate::lock::LockCoordinator;

#[derive(Clone)]
pub struct ItemRuntime {
    documents: Arc<dyn DocumentStore>,
    locks: Arc<LockCoordinator>,
    registry: Arc<ItemRegistry>,
    events: Arc<EventBus>,
}

/// Result of [`ItemRuntime::open`].
#[derive(Debug)]
pub enum OpenOutcome {
    Opened(ActiveItem),
    /// The lock went to someone else, or could not be taken.
    Denied(AcquireOutcome),
}

impl ItemRuntime {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        locks: Arc<LockCoordinator>,
        registry: Arc<ItemRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            documents,
            locks,
            registry,
            events,
        }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn locks(&self) -> &Arc<LockCoordinator> {
        &self.locks
    }

    pub fn registry(&self) -> &Arc<ItemRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn behavior(&self, item_type_id: &str) -> Result<&Arc<dyn ItemBehavior>, CoreError> {
        self.registry.resolve(item_type_id)
    }

    /// `true` when items of this type are opened under a lock.
    pub fn should_lock(&self, item_type_id: &str) -> bool {
        self.registry
            .get(item_type_id)
            .is_some_and(|b| b.should_lock())
    }

    pub async fn get(&self, room_id: &str, item_id: &str) -> RoomResult<PlacedItem> {
        PlacedItemRepo::get(self.documents.as_ref(), room_id, item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Item", item_id).into())
    }

    /// Fill an empty spot with a new item of `item_type_id` owned by
    /// `user_id`. The item's data is seeded from the behavior's initial data.
    pub async fn place(
        &self,
        room_id: &str,
        shelf_id: &str,
        position: u8,
        item_type_id: &str,
        user_id: &str,
    ) -> RoomResult<PlacedItem> {
        validate_position(position)?;
        let behavior = self.behavior(item_type_id)?;

        let now = chrono::Utc::now();
        let item = PlacedItem {
            id: new_id(),
            room_id: room_id.to_string(),
            shelf_id: shelf_id.to_string(),
            position,
            item_type_id: item_type_id.to_string(),
            placed_user_id: user_id.to_string(),
            item_data: behavior.initial_data(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        // The item document goes in first; it is unreachable until the spot
        // points at it.
        let item = PlacedItemRepo::insert(self.documents.as_ref(), &item).await?;
        let claim =
            ShelfRepo::claim_spot(self.documents.as_ref(), room_id, shelf_id, position, &item.id)
                .await;

        let failure: Option<RoomError> = match claim {
            Ok(SpotClaim::Claimed(_)) => None,
            Ok(SpotClaim::Occupied(_)) => Some(
                CoreError::Conflict(format!("Spot {position} is already occupied")).into(),
            ),
            Ok(SpotClaim::ShelfMissing) => Some(CoreError::not_found("Shelf", shelf_id).into()),
            Err(e) => Some(e.into()),
        };
        if let Some(err) = failure {
            if let Err(e) = PlacedItemRepo::delete(self.documents.as_ref(), room_id, &item.id).await
            {
                tracing::warn!(error = %e, item_id = %item.id, "Failed to delete unplaced item");
            }
            return Err(err);
        }

        tracing::info!(
            room_id,
            shelf_id,
            position,
            item_id = %item.id,
            item_type_id,
            user_id,
            "Item placed"
        );
        self.events.publish(
            RoomEvent::new(event_types::ITEM_PLACED, room_id)
                .with_item(item.id.clone())
                .with_actor(user_id)
                .with_payload(json!({
                    "shelf_id": shelf_id,
                    "position": position,
                    "item_type_id": item_type_id,
                })),
        );
        Ok(item)
    }

    /// Empty a spot and delete its item. Refused while another user holds
    /// the item's lock. A lock held by `user_id` is dropped with the item.
    pub async fn remove(
        &self,
        room_id: &str,
        shelf_id: &str,
        position: u8,
        user_id: &str,
    ) -> RoomResult<PlacedItem> {
        validate_position(position)?;
        let shelf = ShelfRepo::get(self.documents.as_ref(), room_id, shelf_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Shelf", shelf_id))?;
        let item_id = shelf
            .item_at(position)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Spot", format!("{shelf_id}/{position}")))?;

        let item_ref = ItemRef::new(room_id, item_id.clone());
        let lock = self.locks.state(&item_ref).await?;
        if let Some(record) = lock.record().filter(|r| !r.is_held_by(user_id)) {
            return Err(CoreError::Conflict(format!(
                "Item is open by {}",
                record.holder_display_name
            ))
            .into());
        }

        let released =
            ShelfRepo::release_spot(self.documents.as_ref(), room_id, shelf_id, position, &item_id)
                .await?;
        if !released {
            return Err(CoreError::Conflict(format!("Spot {position} changed concurrently")).into());
        }

        let item = PlacedItemRepo::get(self.documents.as_ref(), room_id, &item_id).await?;
        PlacedItemRepo::delete(self.documents.as_ref(), room_id, &item_id).await?;
        if lock.is_locked_by(user_id) {
            self.locks.remove_if_held(&item_ref, user_id).await;
        }

        tracing::info!(room_id, shelf_id, position, item_id = %item_id, user_id, "Item removed");
        self.events.publish(
            RoomEvent::new(event_types::ITEM_REMOVED, room_id)
                .with_item(item_id.clone())
                .with_actor(user_id)
                .with_payload(json!({ "shelf_id": shelf_id, "position": position })),
        );

        item.ok_or_else(|| CoreError::not_found("Item", item_id).into())
    }

    /// Render `item` in the requested mode. Unknown item types fail.
    pub fn render(
        &self,
        item: &PlacedItem,
        room: &RoomInfo,
        is_active: bool,
    ) -> Result<ItemView, CoreError> {
        let behavior = self.behavior(&item.item_type_id)?;
        Ok(behavior.render(&RenderContext {
            item_data: &item.item_data,
            room,
            is_active,
        }))
    }

    /// Take the lock on a placed, lockable item.
    ///
    /// Unknown items and item types opened without a lock are rejected
    /// before the presence store is touched.
    pub async fn acquire_lock(
        &self,
        conn: &ConnectionId,
        item_ref: &ItemRef,
        requester: &Requester,
    ) -> RoomResult<AcquireOutcome> {
        requester.validate()?;
        let item = self.get(&item_ref.room_id, &item_ref.item_id).await?;
        if !self.behavior(&item.item_type_id)?.should_lock() {
            return Err(CoreError::Validation(format!(
                "{} items are not lockable",
                item.item_type_id
            ))
            .into());
        }
        Ok(self.locks.acquire(conn, item_ref, requester).await)
    }

    /// Open an item for `requester`. Lockable items are opened only when the
    /// lock is granted; other items open unconditionally.
    pub async fn open(
        &self,
        conn: &ConnectionId,
        item_ref: &ItemRef,
        requester: &Requester,
    ) -> RoomResult<OpenOutcome> {
        requester.validate()?;
        let item = self.get(&item_ref.room_id, &item_ref.item_id).await?;
        let holds_lock = self.behavior(&item.item_type_id)?.should_lock();

        if holds_lock {
            let outcome = self.locks.acquire(conn, item_ref, requester).await;
            if !outcome.granted {
                return Ok(OpenOutcome::Denied(outcome));
            }
        }

        tracing::debug!(
            conn_id = %conn,
            item = %item_ref,
            user_id = %requester.user_id,
            holds_lock,
            "Item opened"
        );
        Ok(OpenOutcome::Opened(ActiveItem {
            runtime: self.clone(),
            conn: conn.clone(),
            user_id: requester.user_id.clone(),
            item,
            holds_lock,
            closed: false,
        }))
    }

    /// Merge a partial update into an item's data.
    ///
    /// With `expected_version` the write is rejected with a conflict when the
    /// item changed since that version; without it the last writer wins.
    pub async fn update_item_data(
        &self,
        room_id: &str,
        item_id: &str,
        partial: Value,
        expected_version: Option<i64>,
        actor_user_id: &str,
    ) -> RoomResult<PlacedItem> {
        let partial = partial_from_value(partial)?;
        let item = self.get(room_id, item_id).await?;
        self.behavior(&item.item_type_id)?.validate_update(&partial)?;
        self.write(&item, &partial, expected_version, actor_user_id)
            .await
    }

    async fn write(
        &self,
        item: &PlacedItem,
        data: &ItemData,
        expected_version: Option<i64>,
        actor_user_id: &str,
    ) -> RoomResult<PlacedItem> {
        let written = PlacedItemRepo::write_item_data(
            self.documents.as_ref(),
            &item.room_id,
            &item.id,
            data,
            expected_version,
        )
        .await?;

        let updated = match written {
            ItemDataWrite::Written(updated) => updated,
            ItemDataWrite::Missing => return Err(CoreError::not_found("Item", &item.id).into()),
            ItemDataWrite::Stale(current) => {
                return Err(CoreError::Conflict(format!(
                    "Item changed since version {}; current version is {}",
                    expected_version.unwrap_or_default(),
                    current.version
                ))
                .into())
            }
        };

        tracing::debug!(
            room_id = %updated.room_id,
            item_id = %updated.id,
            version = updated.version,
            user_id = actor_user_id,
            "Item data updated"
        );
        self.events.publish(
            RoomEvent::new(event_types::ITEM_UPDATED, updated.room_id.clone())
                .with_item(updated.id.clone())
                .with_actor(actor_user_id)
                .with_payload(json!({
                    "version": updated.version,
                    "item_data": updated.item_data,
                })),
        );
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// ActiveItem
// ---------------------------------------------------------------------------

/// One user's open session on an item.
///
/// Must be closed with [`ActiveItem::close`]. Dropping an unclosed session
/// that holds a lock releases it in the background.
pub struct ActiveItem {
    runtime: ItemRuntime,
    conn: ConnectionId,
    user_id: String,
    item: PlacedItem,
    holds_lock: bool,
    closed: bool,
}

impl ActiveItem {
    pub fn item(&self) -> &PlacedItem {
        &self.item
    }

    pub fn item_ref(&self) -> ItemRef {
        self.item.item_ref()
    }

    pub fn holds_lock(&self) -> bool {
        self.holds_lock
    }

    pub fn view(&self, room: &RoomInfo) -> Result<ItemView, CoreError> {
        self.runtime.render(&self.item, room, true)
    }

    /// Merge `partial` into this session's copy of the data and persist the
    /// whole object.
    pub async fn update(&mut self, partial: ItemData) -> RoomResult<&PlacedItem> {
        self.runtime
            .behavior(&self.item.item_type_id)?
            .validate_update(&partial)?;

        let mut data = self.item.item_data.clone();
        merge_item_data(&mut data, &partial);
        self.item = self
            .runtime
            .write(&self.item, &data, None, &self.user_id)
            .await?;
        Ok(&self.item)
    }

    /// End the session, releasing the lock if one is held.
    pub async fn close(mut self) -> bool {
        self.closed = true;
        if !self.holds_lock {
            return false;
        }
        self.runtime
            .locks
            .release(&self.conn, &self.item.item_ref(), &self.user_id)
            .await
    }
}

impl std::fmt::Debug for ActiveItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveItem")
            .field("conn", &self.conn)
            .field("user_id", &self.user_id)
            .field("item_id", &self.item.id)
            .field("holds_lock", &self.holds_lock)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for ActiveItem {
    fn drop(&mut self) {
        if self.closed || !self.holds_lock {
            return;
        }
        let locks = Arc::clone(&self.runtime.locks);
        let conn = self.conn.clone();
        let item = self.item.item_ref();
        let user_id = self.user_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    locks.release(&conn, &item, &user_id).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    item = %item,
                    user_id = %user_id,
                    "Active item dropped outside a runtime; lock left to disconnect cleanup"
                );
            }
        }
    }
}
