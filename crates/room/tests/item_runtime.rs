//! Item placement, removal and the open/update/close lifecycle.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::{json, Value};
use shelfroom_core::behavior::ItemRegistry;
use shelfroom_core::catalog::item_types;
use shelfroom_core::collaboration::LockState;
use shelfroom_core::error::CoreError;
use shelfroom_core::item::{partial_from_value, ItemRef};
use shelfroom_db::repositories::ShelfRepo;
use shelfroom_events::event_types;
use shelfroom_room::{OpenOutcome, RoomError};

use common::{alice, bob, Harness, ROOM};

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn placed_item_data_equals_initial_data() {
    let h = Harness::new().await;
    let registry = ItemRegistry::builtin();

    for (position, type_id) in [item_types::PET, item_types::PLANT, item_types::CLOCK]
        .into_iter()
        .enumerate()
    {
        let id = h.place(position as u8, type_id).await;
        let stored = h.runtime.get(ROOM, &id).await.unwrap();
        let expected = registry.resolve(type_id).unwrap().initial_data();
        assert_eq!(stored.item_data, expected, "{type_id}");
    }
}

#[tokio::test]
async fn placing_fills_the_spot_and_publishes() {
    let h = Harness::new().await;
    let mut rx = h.events.subscribe();

    let id = h.place(1, item_types::PLANT).await;

    let shelf = ShelfRepo::get(h.documents.as_ref(), ROOM, &h.shelf_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shelf.item_at(1), Some(&id));
    let event = rx.recv().await.unwrap();
    assert_eq!(event.event_type, event_types::ITEM_PLACED);
    assert_eq!(event.item_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn occupied_spot_rejects_second_item() {
    let h = Harness::new().await;
    h.place(0, item_types::PET).await;

    let err = h
        .runtime
        .place(ROOM, &h.shelf_id, 0, item_types::PLANT, "bob")
        .await
        .unwrap_err();

    assert_matches!(err, RoomError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn unknown_type_and_bad_position_are_rejected() {
    let h = Harness::new().await;

    let unknown = h
        .runtime
        .place(ROOM, &h.shelf_id, 0, "rocket", "alice")
        .await
        .unwrap_err();
    let position = h
        .runtime
        .place(ROOM, &h.shelf_id, 3, item_types::PET, "alice")
        .await
        .unwrap_err();
    let shelf = h
        .runtime
        .place(ROOM, "missing", 0, item_types::PET, "alice")
        .await
        .unwrap_err();

    assert_matches!(unknown, RoomError::Core(CoreError::NotFound { .. }));
    assert_matches!(position, RoomError::Core(CoreError::Validation(_)));
    assert_matches!(shelf, RoomError::Core(CoreError::NotFound { entity: "Shelf", .. }));
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_is_refused_while_someone_else_has_it_open() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PET).await;
    let conn = h.connect().await;
    let _open = h
        .runtime
        .open(&conn, &ItemRef::new(ROOM, id), &bob())
        .await
        .unwrap();

    let err = h
        .runtime
        .remove(ROOM, &h.shelf_id, 0, "alice")
        .await
        .unwrap_err();

    assert_matches!(err, RoomError::Core(CoreError::Conflict(msg)) if msg.contains("Bob"));
}

#[tokio::test]
async fn remove_frees_spot_and_deletes_item() {
    let h = Harness::new().await;
    let id = h.place(2, item_types::GUESTBOOK).await;

    let removed = h
        .runtime
        .remove(ROOM, &h.shelf_id, 2, "alice")
        .await
        .unwrap();

    assert_eq!(removed.id, id);
    assert!(h.runtime.get(ROOM, &id).await.is_err());
    let shelf = ShelfRepo::get(h.documents.as_ref(), ROOM, &h.shelf_id)
        .await
        .unwrap()
        .unwrap();
    assert!(shelf.item_at(2).is_none());
}

#[tokio::test]
async fn removing_own_open_item_drops_the_lock() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PET).await;
    let conn = h.connect().await;
    let item = ItemRef::new(ROOM, id);
    let _open = h.runtime.open(&conn, &item, &alice()).await.unwrap();

    h.runtime
        .remove(ROOM, &h.shelf_id, 0, "alice")
        .await
        .unwrap();

    assert_eq!(h.locks.state(&item).await.unwrap(), LockState::Unlocked);
}

// ---------------------------------------------------------------------------
// Open / update / close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lockable_item_opens_under_lock() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PET).await;
    let conn_a = h.connect().await;
    let conn_b = h.connect().await;
    let item = ItemRef::new(ROOM, id);

    let a = h.runtime.open(&conn_a, &item, &alice()).await.unwrap();
    let b = h.runtime.open(&conn_b, &item, &bob()).await.unwrap();

    let active = assert_matches!(a, OpenOutcome::Opened(active) => active);
    assert!(active.holds_lock());
    assert_matches!(b, OpenOutcome::Denied(outcome) => {
        assert_eq!(outcome.holder.unwrap().user_id, "alice");
    });
}

#[tokio::test]
async fn clock_opens_for_everyone_without_a_lock_record() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::CLOCK).await;
    let conn_a = h.connect().await;
    let conn_b = h.connect().await;
    let item = ItemRef::new(ROOM, id);

    let a = h.runtime.open(&conn_a, &item, &alice()).await.unwrap();
    let b = h.runtime.open(&conn_b, &item, &bob()).await.unwrap();

    assert_matches!(a, OpenOutcome::Opened(ref active) if !active.holds_lock());
    assert_matches!(b, OpenOutcome::Opened(_));
    assert!(h.lock_keys().await.is_empty());
}

#[tokio::test]
async fn lock_requests_are_checked_against_the_item() {
    let h = Harness::new().await;
    let pet = h.place(0, item_types::PET).await;
    let clock = h.place(1, item_types::CLOCK).await;
    let conn = h.connect().await;

    let unlockable = h
        .runtime
        .acquire_lock(&conn, &ItemRef::new(ROOM, clock), &alice())
        .await;
    let missing = h
        .runtime
        .acquire_lock(&conn, &ItemRef::new(ROOM, "ghost"), &alice())
        .await;
    assert_matches!(unlockable, Err(RoomError::Core(CoreError::Validation(_))));
    assert_matches!(missing, Err(RoomError::Core(CoreError::NotFound { .. })));
    assert!(h.lock_keys().await.is_empty());

    let granted = h
        .runtime
        .acquire_lock(&conn, &ItemRef::new(ROOM, pet), &alice())
        .await
        .unwrap();
    assert!(granted.granted);
    assert_eq!(h.lock_keys().await.len(), 1);
}

#[tokio::test]
async fn update_merges_and_persists_whole_data() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PET).await;
    let conn = h.connect().await;
    let outcome = h
        .runtime
        .open(&conn, &ItemRef::new(ROOM, id.clone()), &alice())
        .await
        .unwrap();
    let mut active = assert_matches!(outcome, OpenOutcome::Opened(active) => active);

    let partial = partial_from_value(json!({"hunger": 0, "last_fed_by": "alice"})).unwrap();
    active.update(partial).await.unwrap();

    let stored = h.runtime.get(ROOM, &id).await.unwrap();
    assert_eq!(
        Value::Object(stored.item_data),
        json!({"name": "Mochi", "hunger": 0, "last_fed_by": "alice"})
    );
    assert_eq!(stored.version, 2);
    assert_eq!(active.item().version, 2);
}

#[tokio::test]
async fn invalid_update_is_rejected_by_behavior() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PET).await;
    let conn = h.connect().await;
    let outcome = h
        .runtime
        .open(&conn, &ItemRef::new(ROOM, id), &alice())
        .await
        .unwrap();
    let mut active = assert_matches!(outcome, OpenOutcome::Opened(active) => active);

    let err = active
        .update(partial_from_value(json!({"hunger": 1000})).unwrap())
        .await
        .unwrap_err();

    assert_matches!(err, RoomError::Core(CoreError::Validation(_)));
}

#[tokio::test]
async fn close_releases_the_lock() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::SKETCHPAD).await;
    let conn = h.connect().await;
    let item = ItemRef::new(ROOM, id);
    let outcome = h.runtime.open(&conn, &item, &alice()).await.unwrap();
    let active = assert_matches!(outcome, OpenOutcome::Opened(active) => active);

    assert!(active.close().await);
    assert_eq!(h.locks.state(&item).await.unwrap(), LockState::Unlocked);
}

#[tokio::test]
async fn dropping_an_open_item_releases_in_background() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PLANT).await;
    let conn = h.connect().await;
    let item = ItemRef::new(ROOM, id);
    let outcome = h.runtime.open(&conn, &item, &alice()).await.unwrap();

    drop(outcome);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.locks.state(&item).await.unwrap(), LockState::Unlocked);
}

// ---------------------------------------------------------------------------
// Direct data updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PLANT).await;
    h.runtime
        .update_item_data(ROOM, &id, json!({"water_level": 7}), Some(1), "alice")
        .await
        .unwrap();

    let err = h
        .runtime
        .update_item_data(ROOM, &id, json!({"water_level": 2}), Some(1), "bob")
        .await
        .unwrap_err();

    assert_matches!(err, RoomError::Core(CoreError::Conflict(_)));
    let stored = h.runtime.get(ROOM, &id).await.unwrap();
    assert_eq!(stored.item_data["water_level"], json!(7));
}

#[tokio::test]
async fn unversioned_writes_are_last_writer_wins() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::GUESTBOOK).await;

    h.runtime
        .update_item_data(ROOM, &id, json!({"entries": ["a"]}), None, "alice")
        .await
        .unwrap();
    let last = h
        .runtime
        .update_item_data(ROOM, &id, json!({"entries": ["b"]}), None, "bob")
        .await
        .unwrap();

    assert_eq!(last.item_data["entries"], json!(["b"]));
}

#[tokio::test]
async fn non_object_update_is_rejected() {
    let h = Harness::new().await;
    let id = h.place(0, item_types::PLANT).await;

    let err = h
        .runtime
        .update_item_data(ROOM, &id, json!(5), None, "alice")
        .await
        .unwrap_err();

    assert_matches!(err, RoomError::Core(CoreError::Validation(_)));
}
