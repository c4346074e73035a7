//! Repository behavior against the in-memory document store.

use assert_matches::assert_matches;
use serde_json::{json, Map, Value};
use shelfroom_core::item::PlacedItem;
use shelfroom_core::room::RosterEntry;
use shelfroom_db::models::room::CreateRoom;
use shelfroom_db::models::shelf::CreateShelf;
use shelfroom_db::repositories::{
    ItemDataWrite, PlacedItemRepo, RoomRepo, RoomStateRepo, ShelfRepo, SpotClaim,
};
use shelfroom_db::{DocumentStore, MemoryDocumentStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

async fn room(store: &dyn DocumentStore, id: &str) {
    RoomRepo::create(
        store,
        &CreateRoom {
            id: Some(id.to_string()),
            name: "Den".to_string(),
        },
    )
    .await
    .unwrap()
    .expect("room created");
}

fn member(user_id: &str, name: &str) -> RosterEntry {
    RosterEntry {
        user_id: user_id.to_string(),
        display_name: name.to_string(),
        avatar_ref: None,
        is_admin: false,
    }
}

fn placed(room_id: &str, shelf_id: &str, id: &str, data: Value) -> PlacedItem {
    let now = chrono::Utc::now();
    PlacedItem {
        id: id.to_string(),
        room_id: room_id.to_string(),
        shelf_id: shelf_id.to_string(),
        position: 0,
        item_type_id: "pet".to_string(),
        placed_user_id: "alice".to_string(),
        item_data: obj(data),
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn creating_a_room_twice_returns_none() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;

    let again = RoomRepo::create(
        &store,
        &CreateRoom {
            id: Some("r1".into()),
            name: "Other".into(),
        },
    )
    .await
    .unwrap();

    assert!(again.is_none());
    assert_eq!(RoomRepo::get(&store, "r1").await.unwrap().unwrap().name, "Den");
}

#[tokio::test]
async fn new_room_has_empty_state() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;

    assert!(RoomStateRepo::get(&store, "r1").await.unwrap().is_empty());
}

#[tokio::test]
async fn roster_upsert_replaces_existing_member() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;

    RoomRepo::upsert_member(&store, "r1", &member("alice", "Alice"))
        .await
        .unwrap();
    let room = RoomRepo::upsert_member(&store, "r1", &member("alice", "Ali"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(room.roster.len(), 1);
    assert_eq!(room.member("alice").unwrap().display_name, "Ali");
}

#[tokio::test]
async fn roster_ops_on_missing_room() {
    let store = MemoryDocumentStore::new();

    let upserted = RoomRepo::upsert_member(&store, "nope", &member("a", "A"))
        .await
        .unwrap();
    let removed = RoomRepo::remove_member(&store, "nope", "a").await.unwrap();

    assert!(upserted.is_none());
    assert!(!removed);
}

#[tokio::test]
async fn remove_member_reports_whether_present() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;
    RoomRepo::upsert_member(&store, "r1", &member("bob", "Bob"))
        .await
        .unwrap();

    assert!(RoomRepo::remove_member(&store, "r1", "bob").await.unwrap());
    assert!(!RoomRepo::remove_member(&store, "r1", "bob").await.unwrap());
}

// ---------------------------------------------------------------------------
// Room state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn room_state_merges_fields() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;

    RoomStateRepo::merge(&store, "r1", obj(json!({"now_playing": "song-a", "theme": "dusk"})))
        .await
        .unwrap();
    let fields = RoomStateRepo::merge(&store, "r1", obj(json!({"now_playing": "song-b"})))
        .await
        .unwrap();

    assert_eq!(
        Value::Object(fields),
        json!({"now_playing": "song-b", "theme": "dusk"})
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_writers_to_missing_state_keep_every_field() {
    let store = std::sync::Arc::new(MemoryDocumentStore::new());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let mut fields = Map::new();
            fields.insert(format!("field-{i}"), json!(i));
            RoomStateRepo::merge(store.as_ref(), "fresh", fields).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let fields = RoomStateRepo::get(store.as_ref(), "fresh").await.unwrap();
    assert_eq!(fields.len(), 16);
    assert_eq!(fields["field-7"], 7);
}

// ---------------------------------------------------------------------------
// Shelves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shelves_list_in_position_order() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;

    let first = ShelfRepo::create(
        &store,
        "r1",
        &CreateShelf {
            name: "Top".into(),
            position: None,
        },
    )
    .await
    .unwrap();
    let second = ShelfRepo::create(
        &store,
        "r1",
        &CreateShelf {
            name: "Bottom".into(),
            position: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(first.position, 0);
    assert_eq!(second.position, 1);
    let names: Vec<String> = ShelfRepo::list(&store, "r1")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Top", "Bottom"]);
}

#[tokio::test]
async fn occupied_spot_cannot_be_claimed() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;
    let shelf = ShelfRepo::create(
        &store,
        "r1",
        &CreateShelf {
            name: "Top".into(),
            position: None,
        },
    )
    .await
    .unwrap();

    let first = ShelfRepo::claim_spot(&store, "r1", &shelf.id, 1, "i1")
        .await
        .unwrap();
    let second = ShelfRepo::claim_spot(&store, "r1", &shelf.id, 1, "i2")
        .await
        .unwrap();

    assert_matches!(first, SpotClaim::Claimed(s) if s.item_at(1) == Some(&"i1".to_string()));
    assert_eq!(second, SpotClaim::Occupied("i1".into()));
}

#[tokio::test]
async fn claim_on_missing_shelf() {
    let store = MemoryDocumentStore::new();

    let claim = ShelfRepo::claim_spot(&store, "r1", "ghost", 0, "i1")
        .await
        .unwrap();

    assert_eq!(claim, SpotClaim::ShelfMissing);
}

#[tokio::test]
async fn release_spot_only_clears_matching_item() {
    let store = MemoryDocumentStore::new();
    room(&store, "r1").await;
    let shelf = ShelfRepo::create(
        &store,
        "r1",
        &CreateShelf {
            name: "Top".into(),
            position: None,
        },
    )
    .await
    .unwrap();
    ShelfRepo::claim_spot(&store, "r1", &shelf.id, 0, "i1")
        .await
        .unwrap();

    assert!(!ShelfRepo::release_spot(&store, "r1", &shelf.id, 0, "other")
        .await
        .unwrap());
    assert!(ShelfRepo::release_spot(&store, "r1", &shelf.id, 0, "i1")
        .await
        .unwrap());
    let shelf = ShelfRepo::get(&store, "r1", &shelf.id).await.unwrap().unwrap();
    assert!(shelf.item_at(0).is_none());
}

// ---------------------------------------------------------------------------
// Placed items
// ---------------------------------------------------------------------------

#[tokio::test]
async fn item_version_comes_from_document() {
    let store = MemoryDocumentStore::new();
    let item = PlacedItemRepo::insert(&store, &placed("r1", "s1", "i1", json!({"hunger": 5})))
        .await
        .unwrap();

    assert_eq!(item.version, 1);
}

#[tokio::test]
async fn inserting_existing_item_fails() {
    let store = MemoryDocumentStore::new();
    let item = placed("r1", "s1", "i1", json!({}));
    PlacedItemRepo::insert(&store, &item).await.unwrap();

    assert!(PlacedItemRepo::insert(&store, &item).await.is_err());
}

#[tokio::test]
async fn unchecked_write_merges_inside_item_data() {
    let store = MemoryDocumentStore::new();
    PlacedItemRepo::insert(
        &store,
        &placed("r1", "s1", "i1", json!({"hunger": 5, "name": "Mochi"})),
    )
    .await
    .unwrap();

    let write = PlacedItemRepo::write_item_data(&store, "r1", "i1", &obj(json!({"hunger": 0})), None)
        .await
        .unwrap();

    assert_matches!(write, ItemDataWrite::Written(item) => {
        assert_eq!(Value::Object(item.item_data), json!({"hunger": 0, "name": "Mochi"}));
        assert_eq!(item.version, 2);
    });
}

#[tokio::test]
async fn stale_expected_version_is_rejected() {
    let store = MemoryDocumentStore::new();
    PlacedItemRepo::insert(&store, &placed("r1", "s1", "i1", json!({"hunger": 5})))
        .await
        .unwrap();
    PlacedItemRepo::write_item_data(&store, "r1", "i1", &obj(json!({"hunger": 4})), Some(1))
        .await
        .unwrap();

    let write = PlacedItemRepo::write_item_data(&store, "r1", "i1", &obj(json!({"hunger": 9})), Some(1))
        .await
        .unwrap();

    assert_matches!(write, ItemDataWrite::Stale(current) => {
        assert_eq!(current.version, 2);
        assert_eq!(current.item_data["hunger"], json!(4));
    });
}

#[tokio::test]
async fn writing_missing_item() {
    let store = MemoryDocumentStore::new();

    let unchecked = PlacedItemRepo::write_item_data(&store, "r1", "nope", &Map::new(), None)
        .await
        .unwrap();
    let checked = PlacedItemRepo::write_item_data(&store, "r1", "nope", &Map::new(), Some(1))
        .await
        .unwrap();

    assert_eq!(unchecked, ItemDataWrite::Missing);
    assert_eq!(checked, ItemDataWrite::Missing);
}

#[tokio::test]
async fn list_and_delete_items() {
    let store = MemoryDocumentStore::new();
    PlacedItemRepo::insert(&store, &placed("r1", "s1", "a", json!({})))
        .await
        .unwrap();
    PlacedItemRepo::insert(&store, &placed("r1", "s1", "b", json!({})))
        .await
        .unwrap();

    assert!(PlacedItemRepo::delete(&store, "r1", "a").await.unwrap());
    let ids: Vec<String> = PlacedItemRepo::list(&store, "r1")
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec!["b"]);
}
