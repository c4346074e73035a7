use std::sync::Arc;
use std::time::Duration;

use shelfroom_room::LockCoordinator;

use crate::ws::manager::WsManager;

/// Spawn a background task that pings every connected WebSocket client and,
/// when leases are enabled, renews the locks those clients hold.
///
/// The returned `JoinHandle` is aborted during shutdown.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    locks: Arc<LockCoordinator>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            interval.tick().await;
            let count = ws_manager.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            ws_manager.ping_all().await;

            if locks.lease().is_some() {
                renew_held_locks(&ws_manager, &locks).await;
            }
        }
    })
}

/// Renew every lock held over a live socket. Locks that are no longer held
/// stop being tracked.
pub async fn renew_held_locks(ws_manager: &WsManager, locks: &LockCoordinator) -> usize {
    let mut renewed = 0;
    for (conn, item, user_id) in ws_manager.held_locks().await {
        if locks.renew(&item, &user_id).await {
            renewed += 1;
        } else {
            tracing::debug!(conn_id = %conn, item = %item, "Lock no longer held, untracking");
            ws_manager.untrack_lock(&conn, &item).await;
        }
    }
    renewed
}
