#![allow(dead_code)]

use std::sync::Arc;

use shelfroom_core::behavior::ItemRegistry;
use shelfroom_core::collaboration::Requester;
use shelfroom_core::room::RosterEntry;
use shelfroom_db::models::room::CreateRoom;
use shelfroom_db::models::shelf::CreateShelf;
use shelfroom_db::repositories::{RoomRepo, ShelfRepo};
use shelfroom_db::{ConnectionId, MemoryDocumentStore, MemoryPresenceStore, PresenceStore};
use shelfroom_events::EventBus;
use shelfroom_room::{ItemRuntime, LockCoordinator, RoomStateSync, ShelfGrid};

pub const ROOM: &str = "den";

/// Services wired to in-memory stores, with one room holding one shelf and
/// two members, alice and bob.
pub struct Harness {
    pub presence: Arc<MemoryPresenceStore>,
    pub documents: Arc<MemoryDocumentStore>,
    pub events: Arc<EventBus>,
    pub locks: Arc<LockCoordinator>,
    pub runtime: ItemRuntime,
    pub grid: ShelfGrid,
    pub room_state: RoomStateSync,
    pub shelf_id: String,
}

pub fn alice() -> Requester {
    Requester::new("alice", "Alice", Some("avatars/alice.png".into()))
}

pub fn bob() -> Requester {
    Requester::new("bob", "Bob", None)
}

fn member(requester: &Requester) -> RosterEntry {
    RosterEntry {
        user_id: requester.user_id.clone(),
        display_name: requester.display_name.clone(),
        avatar_ref: requester.avatar_ref.clone(),
        is_admin: false,
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_locks(LockCoordinator::new).await
    }

    pub async fn with_locks(
        build: impl FnOnce(Arc<dyn PresenceStore>) -> LockCoordinator,
    ) -> Self {
        let presence = Arc::new(MemoryPresenceStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let events = Arc::new(EventBus::default());
        let shared: Arc<dyn PresenceStore> = presence.clone();
        let locks = Arc::new(build(shared));
        let runtime = ItemRuntime::new(
            documents.clone(),
            locks.clone(),
            Arc::new(ItemRegistry::builtin()),
            events.clone(),
        );

        RoomRepo::create(
            documents.as_ref(),
            &CreateRoom {
                id: Some(ROOM.into()),
                name: "The Den".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();
        for requester in [alice(), bob()] {
            RoomRepo::upsert_member(documents.as_ref(), ROOM, &member(&requester))
                .await
                .unwrap();
        }
        let shelf = ShelfRepo::create(
            documents.as_ref(),
            ROOM,
            &CreateShelf {
                name: "Top".into(),
                position: None,
            },
        )
        .await
        .unwrap();

        Self {
            grid: ShelfGrid::new(runtime.clone()),
            room_state: RoomStateSync::new(documents.clone(), events.clone()),
            presence,
            documents,
            events,
            locks,
            runtime,
            shelf_id: shelf.id,
        }
    }

    pub async fn connect(&self) -> ConnectionId {
        self.presence.connect().await.unwrap()
    }

    /// Place an item of `item_type_id` at `position`, owned by alice.
    pub async fn place(&self, position: u8, item_type_id: &str) -> String {
        self.runtime
            .place(ROOM, &self.shelf_id, position, item_type_id, "alice")
            .await
            .unwrap()
            .id
    }

    pub async fn lock_keys(&self) -> Vec<String> {
        self.presence
            .list("locks/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }
}
