//! Shelf rendering and tap handling, including the two-user lock scenario.

mod common;

use assert_matches::assert_matches;
use shelfroom_core::catalog::item_types;
use shelfroom_core::collaboration::OPEN_FAILED_MESSAGE;
use shelfroom_core::shelf::SpotView;
use shelfroom_db::repositories::RoomRepo;
use shelfroom_room::PressOutcome;

use common::{alice, bob, Harness, ROOM};

#[tokio::test]
async fn empty_spots_route_to_item_selection() {
    let h = Harness::new().await;
    let conn = h.connect().await;

    let with = h
        .grid
        .press(&conn, ROOM, &h.shelf_id, 1, &alice(), true)
        .await
        .unwrap();
    let without = h
        .grid
        .press(&conn, ROOM, &h.shelf_id, 1, &alice(), false)
        .await
        .unwrap();

    assert_matches!(with, PressOutcome::PickItem { position: 1 });
    assert_matches!(without, PressOutcome::Ignored);
}

#[tokio::test]
async fn view_renders_three_spots() {
    let h = Harness::new().await;
    h.place(1, item_types::CLOCK).await;

    let view = h
        .grid
        .view(ROOM, &h.shelf_id, "bob", true)
        .await
        .unwrap();

    assert_eq!(view.spots.len(), 3);
    assert_matches!(view.spots[0], SpotView::Empty { can_add: true, .. });
    assert_matches!(&view.spots[1], SpotView::Occupied { should_lock: false, overlay: None, .. });
    assert_matches!(view.spots[2], SpotView::Empty { .. });
}

#[tokio::test]
async fn two_users_take_turns_on_a_lockable_item() {
    let h = Harness::new().await;
    h.place(0, item_types::PET).await;
    let conn_a = h.connect().await;
    let conn_b = h.connect().await;

    // Alice opens the pet.
    let pressed = h
        .grid
        .press(&conn_a, ROOM, &h.shelf_id, 0, &alice(), true)
        .await
        .unwrap();
    let active = assert_matches!(pressed, PressOutcome::Opened(active) => active);

    // Bob sees Alice's overlay and cannot open it.
    let view = h.grid.view(ROOM, &h.shelf_id, "bob", true).await.unwrap();
    let overlay = view.spots[0].overlay().expect("overlay for bob");
    assert_eq!(overlay.label, "Alice");
    assert_eq!(overlay.avatar_ref.as_deref(), Some("avatars/alice.png"));
    let blocked = h
        .grid
        .press(&conn_b, ROOM, &h.shelf_id, 0, &bob(), true)
        .await
        .unwrap();
    assert_matches!(blocked, PressOutcome::Blocked(o) if o.holder_user_id == "alice");

    // Alice sees no overlay on her own lock.
    let own = h.grid.view(ROOM, &h.shelf_id, "alice", true).await.unwrap();
    assert_matches!(
        &own.spots[0],
        SpotView::Occupied { overlay: None, locked_by_viewer: true, .. }
    );

    // Alice closes; Bob gets it.
    assert!(active.close().await);
    let view = h.grid.view(ROOM, &h.shelf_id, "bob", true).await.unwrap();
    assert!(view.spots[0].overlay().is_none());
    let pressed = h
        .grid
        .press(&conn_b, ROOM, &h.shelf_id, 0, &bob(), true)
        .await
        .unwrap();
    assert_matches!(pressed, PressOutcome::Opened(_));
}

#[tokio::test]
async fn holder_who_left_is_shown_from_snapshot() {
    let h = Harness::new().await;
    h.place(0, item_types::SKETCHPAD).await;
    let conn_a = h.connect().await;
    let _active = h
        .grid
        .press(&conn_a, ROOM, &h.shelf_id, 0, &alice(), true)
        .await
        .unwrap();

    RoomRepo::remove_member(h.documents.as_ref(), ROOM, "alice")
        .await
        .unwrap();
    let view = h.grid.view(ROOM, &h.shelf_id, "bob", true).await.unwrap();

    let overlay = view.spots[0].overlay().expect("overlay");
    assert_eq!(overlay.label, "Alice");
    assert!(!overlay.from_roster);
}

#[tokio::test]
async fn clock_is_opened_by_both_users() {
    let h = Harness::new().await;
    h.place(2, item_types::CLOCK).await;
    let conn_a = h.connect().await;
    let conn_b = h.connect().await;

    let a = h
        .grid
        .press(&conn_a, ROOM, &h.shelf_id, 2, &alice(), true)
        .await
        .unwrap();
    let b = h
        .grid
        .press(&conn_b, ROOM, &h.shelf_id, 2, &bob(), true)
        .await
        .unwrap();

    assert_matches!(a, PressOutcome::Opened(_));
    assert_matches!(b, PressOutcome::Opened(_));
    assert!(h.lock_keys().await.is_empty());
}

#[tokio::test]
async fn failed_lock_shows_generic_message() {
    let h = Harness::new().await;
    h.place(0, item_types::PET).await;
    let ghost = shelfroom_db::ConnectionId::from("not-connected");

    let pressed = h
        .grid
        .press(&ghost, ROOM, &h.shelf_id, 0, &alice(), true)
        .await
        .unwrap();

    assert_matches!(pressed, PressOutcome::Failed(msg) if msg == OPEN_FAILED_MESSAGE);
    assert!(h.lock_keys().await.is_empty());
}

#[tokio::test]
async fn missing_shelf_is_an_error() {
    let h = Harness::new().await;
    let conn = h.connect().await;

    assert!(h.grid.view(ROOM, "nope", "alice", true).await.is_err());
    assert!(h
        .grid
        .press(&conn, ROOM, "nope", 0, &alice(), true)
        .await
        .is_err());
}
