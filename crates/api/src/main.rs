use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shelfroom_db::{DocumentStore, MemoryDocumentStore, MemoryPresenceStore, PgDocumentStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfroom_api::config::ServerConfig;
use shelfroom_api::router::build_app_router;
use shelfroom_api::state::AppState;
use shelfroom_api::{background, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shelfroom_api=debug,shelfroom_room=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        lock_lease_enabled = config.lock_lease_enabled,
        "Loaded server configuration"
    );

    // --- Document store ---
    let documents: Arc<dyn DocumentStore> = match &config.database_url {
        Some(database_url) => {
            let pool = shelfroom_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            shelfroom_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            shelfroom_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgDocumentStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, documents are kept in memory");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    // --- Presence store and services ---
    let presence = Arc::new(MemoryPresenceStore::new());
    let state = AppState::new(config.clone(), documents, presence);
    let ws_manager = Arc::clone(&state.ws_manager);
    let locks = Arc::clone(&state.locks);
    let event_bus = Arc::clone(&state.event_bus);

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&ws_manager),
        Arc::clone(&locks),
        config.heartbeat_interval(),
    );

    // --- Room event fan-out ---
    let fanout = ws::RoomEventFanout::new(Arc::clone(&ws_manager));
    let fanout_handle = tokio::spawn(fanout.run(event_bus.subscribe()));

    // --- Lock lease sweeper ---
    let sweeper_cancel = CancellationToken::new();
    let sweeper_handle = locks.lease().map(|_| {
        tokio::spawn(background::lock_lease::run(
            Arc::clone(&locks),
            config.heartbeat_interval(),
            sweeper_cancel.clone(),
        ))
    });

    tracing::info!("Background services started (heartbeat, event fan-out, lease sweeper)");

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    sweeper_cancel.cancel();
    if let Some(handle) = sweeper_handle {
        let _ = tokio::time::timeout(shutdown_timeout, handle).await;
        tracing::info!("Lock lease sweeper stopped");
    }

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    // The router held the last state clones; dropping our bus handle closes
    // the broadcast channel and ends the fan-out loop.
    drop(event_bus);
    if tokio::time::timeout(shutdown_timeout, fanout_handle).await.is_err() {
        tracing::warn!("Room event fan-out did not stop in time");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
