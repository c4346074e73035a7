//! Lock coordinator: acquire, release and observe the exclusive lock on one
//! lockable item.
//!
//! Lock records live in the presence store under [`lock_key`] and are only
//! ever changed through conditional transactions. A granted lock is bound to
//! the requesting connection with a disconnect hook, so the store itself
//! removes the record when that connection goes away.
//!
//! Store failures never escape [`LockCoordinator::acquire`] or
//! [`LockCoordinator::release`]: acquire reports them as a denied outcome
//! carrying an error message, release logs them and gives up.

use std::sync::Arc;

use serde_json::Value;
use shelfroom_core::collaboration::{
    lock_key, parse_lock_key, AcquireOutcome, LockLease, LockRecord, LockState, Requester,
    LOCK_KEY_PREFIX,
};
use shelfroom_core::item::ItemRef;
use shelfroom_core::types::{now_millis, Millis};
use shelfroom_db::{ConnectionId, DisconnectGuard, PresenceError, PresenceStore, TxDecision};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct LockCoordinator {
    presence: Arc<dyn PresenceStore>,
    lease: Option<LockLease>,
}

fn parse_record(value: Option<&Value>) -> Option<LockRecord> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn observe(value: Option<&Value>, lease: Option<LockLease>) -> LockState {
    LockState::observe(parse_record(value), now_millis(), lease)
}

/// Decide an acquire over connection `conn` against the current record.
fn decide_acquire(
    current: Option<&Value>,
    requester: &Requester,
    conn: &str,
    now: Millis,
    lease: Option<LockLease>,
) -> TxDecision {
    let fresh = || match serde_json::to_value(LockRecord::new(requester, now).bound_to(conn)) {
        Ok(value) => TxDecision::Set(value),
        Err(_) => TxDecision::Abort,
    };

    let Some(current) = current else {
        return fresh();
    };
    let Some(record) = parse_record(Some(current)) else {
        return TxDecision::Abort;
    };

    if record.is_held_by(&requester.user_id) {
        // Re-entry keeps the original acquisition time and moves the record
        // to the requesting connection. Under a lease it also counts as a
        // renewal.
        if lease.is_none() && record.is_bound_to(conn) {
            return TxDecision::Keep;
        }
        let renewed = LockRecord {
            renewed_at_millis: lease.map(|_| now).or(record.renewed_at_millis),
            holder_connection_id: Some(conn.to_string()),
            ..record
        };
        return match serde_json::to_value(renewed) {
            Ok(value) => TxDecision::Set(value),
            Err(_) => TxDecision::Keep,
        };
    }

    if record.is_abandoned(now, lease) {
        return fresh();
    }
    TxDecision::Abort
}

impl LockCoordinator {
    pub fn new(presence: Arc<dyn PresenceStore>) -> Self {
        Self {
            presence,
            lease: None,
        }
    }

    /// Enable the heartbeat lease fallback.
    pub fn with_lease(mut self, lease: LockLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn lease(&self) -> Option<LockLease> {
        self.lease
    }

    pub fn presence(&self) -> &Arc<dyn PresenceStore> {
        &self.presence
    }

    /// Try to take the lock on `item` for `requester`, bound to `conn`.
    ///
    /// Granted when the record afterwards names the requester, including the
    /// case where they already held it.
    pub async fn acquire(
        &self,
        conn: &ConnectionId,
        item: &ItemRef,
        requester: &Requester,
    ) -> AcquireOutcome {
        let key = lock_key(item);
        let now = now_millis();
        let lease = self.lease;

        let outcome = match self
            .presence
            .transaction(&key, &|current| {
                decide_acquire(current, requester, conn.as_str(), now, lease)
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    room_id = %item.room_id,
                    item_id = %item.item_id,
                    user_id = %requester.user_id,
                    "Lock acquire transaction failed"
                );
                return AcquireOutcome::failed(e.to_string());
            }
        };

        let Some(record) = parse_record(outcome.value.as_ref()) else {
            if outcome.value.is_some() {
                tracing::warn!(key = %key, "Unreadable lock record");
                return AcquireOutcome::failed(format!("unreadable lock record at {key}"));
            }
            return AcquireOutcome::failed(format!("lock record at {key} vanished"));
        };

        if !outcome.committed || !record.is_held_by(&requester.user_id) {
            tracing::debug!(
                room_id = %item.room_id,
                item_id = %item.item_id,
                user_id = %requester.user_id,
                holder = %record.holder_user_id,
                "Lock denied"
            );
            return AcquireOutcome::denied(Some(record.holder()));
        }

        // The hook only fires while the record is still this user's on this
        // connection; a takeover or a later re-entry elsewhere disarms it.
        let guard = DisconnectGuard::fields([
            ("holder_user_id", Value::from(requester.user_id.as_str())),
            ("holder_connection_id", Value::from(conn.as_str())),
        ]);
        if let Err(e) = self.presence.on_disconnect_remove(conn, &key, guard).await {
            tracing::warn!(
                error = %e,
                conn_id = %conn,
                room_id = %item.room_id,
                item_id = %item.item_id,
                "Disconnect hook not registered, rolling back lock"
            );
            self.remove_if_held(item, &requester.user_id).await;
            return AcquireOutcome::failed(format!("could not bind lock to connection: {e}"));
        }

        tracing::info!(
            conn_id = %conn,
            room_id = %item.room_id,
            item_id = %item.item_id,
            user_id = %requester.user_id,
            acquired_at = record.acquired_at_millis,
            "Lock granted"
        );
        AcquireOutcome::granted(record.holder())
    }

    /// Release `item` if `user_id` holds it. Returns `true` when a record was
    /// removed. Absent or foreign records are left alone.
    pub async fn release(&self, conn: &ConnectionId, item: &ItemRef, user_id: &str) -> bool {
        let removed = self.remove_if_held(item, user_id).await;

        if let Err(e) = self
            .presence
            .cancel_on_disconnect(conn, &lock_key(item))
            .await
        {
            tracing::debug!(error = %e, conn_id = %conn, "Failed to cancel disconnect hook");
        }

        if removed {
            tracing::info!(
                conn_id = %conn,
                room_id = %item.room_id,
                item_id = %item.item_id,
                user_id,
                "Lock released"
            );
        }
        removed
    }

    /// Conditionally delete the record for `item` when `user_id` holds it.
    /// Errors are logged and reported as nothing removed.
    pub async fn remove_if_held(&self, item: &ItemRef, user_id: &str) -> bool {
        let result = self
            .presence
            .transaction(&lock_key(item), &|current| {
                match parse_record(current) {
                    Some(record) if record.is_held_by(user_id) => TxDecision::Remove,
                    _ => TxDecision::Abort,
                }
            })
            .await;

        match result {
            Ok(outcome) => outcome.committed,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    room_id = %item.room_id,
                    item_id = %item.item_id,
                    user_id,
                    "Lock release transaction failed"
                );
                false
            }
        }
    }

    /// Current lock state of `item` as a reader sees it.
    pub async fn state(&self, item: &ItemRef) -> Result<LockState, PresenceError> {
        let value = self.presence.get(&lock_key(item)).await?;
        Ok(observe(value.as_ref(), self.lease))
    }

    /// Stream of lock states for `item`, starting at the current one.
    pub async fn watch(&self, item: &ItemRef) -> Result<LockWatch, PresenceError> {
        let rx = self.presence.watch(&lock_key(item)).await?;
        Ok(LockWatch {
            item: item.clone(),
            rx,
            lease: self.lease,
        })
    }

    /// Call `callback` with the current state right away and again on every
    /// change until the returned [`Subscription`] is dropped.
    pub async fn subscribe<F>(
        &self,
        item: &ItemRef,
        callback: F,
    ) -> Result<Subscription, PresenceError>
    where
        F: Fn(LockState) + Send + 'static,
    {
        let mut watch = self.watch(item).await?;
        callback(watch.current());
        let handle = tokio::spawn(async move {
            while let Some(state) = watch.changed().await {
                callback(state);
            }
        });
        Ok(Subscription { handle })
    }

    /// Refresh the lease on a lock held by `user_id`. Returns `false` when
    /// the user does not hold it.
    pub async fn renew(&self, item: &ItemRef, user_id: &str) -> bool {
        let now = now_millis();
        let result = self
            .presence
            .transaction(&lock_key(item), &|current| match parse_record(current) {
                Some(record) if record.is_held_by(user_id) => {
                    let renewed = LockRecord {
                        renewed_at_millis: Some(now),
                        ..record
                    };
                    match serde_json::to_value(renewed) {
                        Ok(value) => TxDecision::Set(value),
                        Err(_) => TxDecision::Abort,
                    }
                }
                _ => TxDecision::Abort,
            })
            .await;

        match result {
            Ok(outcome) => outcome.committed,
            Err(e) => {
                tracing::warn!(error = %e, item = %item, user_id, "Lock renewal failed");
                false
            }
        }
    }

    /// Remove every record whose lease has run out. A no-op without a lease.
    pub async fn sweep_abandoned(&self) -> Result<usize, PresenceError> {
        let Some(lease) = self.lease else {
            return Ok(0);
        };

        let mut removed = 0;
        for (key, value) in self.presence.list(LOCK_KEY_PREFIX).await? {
            let now = now_millis();
            let abandoned =
                parse_record(Some(&value)).is_some_and(|r| r.is_abandoned(now, Some(lease)));
            if !abandoned {
                continue;
            }

            // Re-check inside the transaction: the holder may have renewed.
            let outcome = self
                .presence
                .transaction(&key, &|current| match parse_record(current) {
                    Some(r) if r.is_abandoned(now, Some(lease)) => TxDecision::Remove,
                    _ => TxDecision::Abort,
                })
                .await?;
            if outcome.committed {
                removed += 1;
                if let Some(item) = parse_lock_key(&key) {
                    tracing::info!(
                        room_id = %item.room_id,
                        item_id = %item.item_id,
                        "Abandoned lock removed"
                    );
                }
            }
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Lock state stream for one item.
pub struct LockWatch {
    item: ItemRef,
    rx: watch::Receiver<Option<Value>>,
    lease: Option<LockLease>,
}

impl LockWatch {
    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    /// Latest state, marking it as seen.
    pub fn current(&mut self) -> LockState {
        let value = self.rx.borrow_and_update().clone();
        observe(value.as_ref(), self.lease)
    }

    /// Wait for the next change. `None` once the store stops publishing.
    pub async fn changed(&mut self) -> Option<LockState> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }
}

/// Handle for a [`LockCoordinator::subscribe`] callback. Dropping it stops
/// the callback.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop the callback now rather than when the handle goes out of scope.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
