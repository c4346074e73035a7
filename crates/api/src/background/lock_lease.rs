//! Periodic removal of abandoned lock records.
//!
//! Only spawned when leases are enabled. Runs once per heartbeat interval, so
//! a record is reclaimed at most one interval after it became abandoned.

use std::sync::Arc;
use std::time::Duration;

use shelfroom_room::LockCoordinator;
use tokio_util::sync::CancellationToken;

/// Run the sweeper loop until `cancel` is triggered.
pub async fn run(locks: Arc<LockCoordinator>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Lock lease sweeper started");

    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock lease sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match locks.sweep_abandoned().await {
                    Ok(0) => tracing::debug!("Lock lease sweep: nothing abandoned"),
                    Ok(removed) => tracing::info!(removed, "Lock lease sweep: removed abandoned locks"),
                    Err(e) => tracing::error!(error = %e, "Lock lease sweep failed"),
                }
            }
        }
    }
}
