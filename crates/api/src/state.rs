use std::sync::Arc;

use shelfroom_core::behavior::ItemRegistry;
use shelfroom_db::{DocumentStore, PresenceStore};
use shelfroom_events::EventBus;
use shelfroom_room::{ItemRuntime, LockCoordinator, RoomStateSync, ShelfGrid};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Durable store for rooms, shelves, items and room state.
    pub documents: Arc<dyn DocumentStore>,
    /// Ephemeral store holding lock records and connection hooks.
    pub presence: Arc<dyn PresenceStore>,
    pub locks: Arc<LockCoordinator>,
    pub runtime: ItemRuntime,
    pub grid: ShelfGrid,
    pub room_state: RoomStateSync,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
    /// Room events published by the services and fanned out to sockets.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the room services on top of the given stores.
    pub fn new(
        config: ServerConfig,
        documents: Arc<dyn DocumentStore>,
        presence: Arc<dyn PresenceStore>,
    ) -> Self {
        let registry = ItemRegistry::builtin();
        let missing = registry.missing_behaviors();
        if !missing.is_empty() {
            tracing::warn!(?missing, "Catalog items without a behavior");
        }

        let mut locks = LockCoordinator::new(Arc::clone(&presence));
        if let Some(lease) = config.lock_lease() {
            locks = locks.with_lease(lease);
        }
        let locks = Arc::new(locks);

        let event_bus = Arc::new(EventBus::default());
        let runtime = ItemRuntime::new(
            Arc::clone(&documents),
            Arc::clone(&locks),
            Arc::new(registry),
            Arc::clone(&event_bus),
        );

        Self {
            config: Arc::new(config),
            grid: ShelfGrid::new(runtime.clone()),
            room_state: RoomStateSync::new(Arc::clone(&documents), Arc::clone(&event_bus)),
            documents,
            presence,
            locks,
            runtime,
            ws_manager: Arc::new(WsManager::new()),
            event_bus,
        }
    }
}
