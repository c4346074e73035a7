//! Ephemeral presence store with connection-scoped disconnect hooks.
//!
//! Values live only for the lifetime of the process. Every client connection
//! is registered with [`PresenceStore::connect`]; keys registered through
//! [`PresenceStore::on_disconnect_remove`] are deleted by the store itself
//! when [`PresenceStore::disconnect`] runs for that connection, whatever the
//! reason the connection went away. A hook can carry a [`DisconnectGuard`], in
//! which case it only removes the key while the stored value still matches.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex};

use crate::tx::{TxDecision, TxOutcome};

/// Identifier of one client connection to the presence store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Unknown presence connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Presence transport error: {0}")]
    Transport(String),

    #[error("Presence permission denied: {0}")]
    PermissionDenied(String),

    #[error("Presence value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Condition a disconnect hook checks before removing its key.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisconnectGuard {
    /// Remove whatever value is stored.
    #[default]
    Always,
    /// Remove only while every listed top-level field still has this value.
    FieldsMatch(Map<String, Value>),
}

impl DisconnectGuard {
    pub fn fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::FieldsMatch(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn allows(&self, current: &Value) -> bool {
        match self {
            Self::Always => true,
            Self::FieldsMatch(expected) => expected
                .iter()
                .all(|(field, value)| current.get(field) == Some(value)),
        }
    }
}

/// Decision function run inside [`PresenceStore::transaction`].
pub type PresenceDecide<'a> = &'a (dyn Fn(Option<&Value>) -> TxDecision + Send + Sync);

#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Register a new connection.
    async fn connect(&self) -> Result<ConnectionId, PresenceError>;

    /// Drop a connection and run every removal hook registered for it.
    /// Returns the number of keys removed. Unknown connections are a no-op.
    async fn disconnect(&self, conn: &ConnectionId) -> Result<usize, PresenceError>;

    /// `true` while `conn` is registered.
    async fn is_connected(&self, conn: &ConnectionId) -> Result<bool, PresenceError>;

    async fn get(&self, key: &str) -> Result<Option<Value>, PresenceError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), PresenceError>;

    /// Returns `true` if the key existed.
    async fn remove(&self, key: &str) -> Result<bool, PresenceError>;

    /// All keys starting with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, PresenceError>;

    /// Atomically read `key`, let `decide` choose, and apply the decision.
    async fn transaction(
        &self,
        key: &str,
        decide: PresenceDecide<'_>,
    ) -> Result<TxOutcome<Value>, PresenceError>;

    /// Delete `key` when `conn` disconnects, provided `guard` still allows it
    /// at that moment. Registering again for the same key replaces the guard.
    async fn on_disconnect_remove(
        &self,
        conn: &ConnectionId,
        key: &str,
        guard: DisconnectGuard,
    ) -> Result<(), PresenceError>;

    /// Undo [`on_disconnect_remove`](Self::on_disconnect_remove).
    async fn cancel_on_disconnect(&self, conn: &ConnectionId, key: &str)
        -> Result<(), PresenceError>;

    /// Stream of values for `key`. The receiver starts at the current value.
    async fn watch(&self, key: &str) -> Result<watch::Receiver<Option<Value>>, PresenceError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PresenceState {
    entries: HashMap<String, Value>,
    /// Keys to remove per connection, each with its guard.
    hooks: HashMap<ConnectionId, HashMap<String, DisconnectGuard>>,
    watchers: HashMap<String, watch::Sender<Option<Value>>>,
}

impl PresenceState {
    fn write(&mut self, key: &str, value: Option<Value>) {
        match &value {
            Some(v) => {
                self.entries.insert(key.to_string(), v.clone());
            }
            None => {
                self.entries.remove(key);
            }
        }
        self.notify(key, value);
    }

    fn notify(&mut self, key: &str, value: Option<Value>) {
        let stale = match self.watchers.get(key) {
            Some(sender) => sender.receiver_count() == 0,
            None => return,
        };
        if stale {
            self.watchers.remove(key);
        } else if let Some(sender) = self.watchers.get(key) {
            sender.send_replace(value);
        }
    }
}

/// Process-local presence store. A single mutex serializes every operation,
/// which makes each transaction atomic.
#[derive(Default)]
pub struct MemoryPresenceStore {
    state: Mutex<PresenceState>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.hooks.len()
    }

    /// Number of keys with a live watch channel.
    pub async fn watched_key_count(&self) -> usize {
        self.state.lock().await.watchers.len()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn connect(&self) -> Result<ConnectionId, PresenceError> {
        let conn = ConnectionId::new();
        self.state
            .lock()
            .await
            .hooks
            .insert(conn.clone(), HashMap::new());
        tracing::debug!(conn_id = %conn, "Presence connection registered");
        Ok(conn)
    }

    async fn disconnect(&self, conn: &ConnectionId) -> Result<usize, PresenceError> {
        let mut state = self.state.lock().await;
        let Some(keys) = state.hooks.remove(conn) else {
            return Ok(0);
        };

        let mut removed = 0;
        for (key, guard) in keys {
            let matches = state
                .entries
                .get(&key)
                .is_some_and(|current| guard.allows(current));
            if matches {
                state.write(&key, None);
                removed += 1;
            } else {
                tracing::trace!(conn_id = %conn, key = %key, "Disconnect hook skipped, value changed hands");
            }
        }
        tracing::debug!(conn_id = %conn, removed, "Presence connection dropped");
        Ok(removed)
    }

    async fn is_connected(&self, conn: &ConnectionId) -> Result<bool, PresenceError> {
        Ok(self.state.lock().await.hooks.contains_key(conn))
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, PresenceError> {
        Ok(self.state.lock().await.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PresenceError> {
        self.state.lock().await.write(key, Some(value));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, PresenceError> {
        let mut state = self.state.lock().await;
        if !state.entries.contains_key(key) {
            return Ok(false);
        }
        state.write(key, None);
        Ok(true)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, PresenceError> {
        let state = self.state.lock().await;
        let mut found: Vec<(String, Value)> = state
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    async fn transaction(
        &self,
        key: &str,
        decide: PresenceDecide<'_>,
    ) -> Result<TxOutcome<Value>, PresenceError> {
        let mut state = self.state.lock().await;
        let current = state.entries.get(key).cloned();

        match decide(current.as_ref()) {
            TxDecision::Abort => Ok(TxOutcome::aborted(current)),
            TxDecision::Keep => Ok(TxOutcome::committed(current)),
            TxDecision::Set(value) => {
                state.write(key, Some(value.clone()));
                Ok(TxOutcome::committed(Some(value)))
            }
            TxDecision::Remove => {
                if current.is_some() {
                    state.write(key, None);
                }
                Ok(TxOutcome::committed(None))
            }
        }
    }

    async fn on_disconnect_remove(
        &self,
        conn: &ConnectionId,
        key: &str,
        guard: DisconnectGuard,
    ) -> Result<(), PresenceError> {
        let mut state = self.state.lock().await;
        let hooks = state
            .hooks
            .get_mut(conn)
            .ok_or_else(|| PresenceError::UnknownConnection(conn.clone()))?;
        hooks.insert(key.to_string(), guard);
        Ok(())
    }

    async fn cancel_on_disconnect(
        &self,
        conn: &ConnectionId,
        key: &str,
    ) -> Result<(), PresenceError> {
        let mut state = self.state.lock().await;
        if let Some(hooks) = state.hooks.get_mut(conn) {
            hooks.remove(key);
        }
        Ok(())
    }

    async fn watch(&self, key: &str) -> Result<watch::Receiver<Option<Value>>, PresenceError> {
        let mut state = self.state.lock().await;
        // Drop senders whose receivers are all gone.
        state.watchers.retain(|_, sender| sender.receiver_count() > 0);
        let current = state.entries.get(key).cloned();
        let sender = state
            .watchers
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(current).0);
        Ok(sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let store = MemoryPresenceStore::new();
        store.set("a", json!(1)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn transaction_abort_leaves_value() {
        let store = MemoryPresenceStore::new();
        store.set("k", json!("old")).await.unwrap();

        let outcome = store
            .transaction("k", &|_| TxDecision::Abort)
            .await
            .unwrap();

        assert!(!outcome.committed);
        assert_eq!(outcome.value, Some(json!("old")));
        assert_eq!(store.get("k").await.unwrap(), Some(json!("old")));
    }

    #[tokio::test]
    async fn transaction_sets_only_when_absent() {
        let store = MemoryPresenceStore::new();
        let decide = |current: Option<&Value>| match current {
            None => TxDecision::Set(json!("first")),
            Some(_) => TxDecision::Abort,
        };

        let first = store.transaction("k", &decide).await.unwrap();
        let second = store.transaction("k", &decide).await.unwrap();

        assert!(first.committed);
        assert!(!second.committed);
        assert_eq!(second.value, Some(json!("first")));
    }

    #[tokio::test]
    async fn disconnect_runs_registered_hooks_only() {
        let store = MemoryPresenceStore::new();
        let conn = store.connect().await.unwrap();
        store.set("held", json!(true)).await.unwrap();
        store.set("other", json!(true)).await.unwrap();
        store.on_disconnect_remove(&conn, "held", DisconnectGuard::Always).await.unwrap();

        let removed = store.disconnect(&conn).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.get("held").await.unwrap(), None);
        assert_eq!(store.get("other").await.unwrap(), Some(json!(true)));
        assert!(!store.is_connected(&conn).await.unwrap());
    }

    #[tokio::test]
    async fn cancelled_hook_does_not_fire() {
        let store = MemoryPresenceStore::new();
        let conn = store.connect().await.unwrap();
        store.set("k", json!(1)).await.unwrap();
        store.on_disconnect_remove(&conn, "k", DisconnectGuard::Always).await.unwrap();
        store.cancel_on_disconnect(&conn, "k").await.unwrap();

        assert_eq!(store.disconnect(&conn).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn guarded_hook_skips_a_value_that_changed_hands() {
        let store = MemoryPresenceStore::new();
        let conn = store.connect().await.unwrap();
        store.set("k", json!({ "owner": "a", "n": 1 })).await.unwrap();
        store
            .on_disconnect_remove(&conn, "k", DisconnectGuard::fields([("owner", json!("a"))]))
            .await
            .unwrap();
        store.set("k", json!({ "owner": "b", "n": 1 })).await.unwrap();

        assert_eq!(store.disconnect(&conn).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap(), Some(json!({ "owner": "b", "n": 1 })));
    }

    #[tokio::test]
    async fn guarded_hook_ignores_unlisted_fields() {
        let store = MemoryPresenceStore::new();
        let conn = store.connect().await.unwrap();
        store.set("k", json!({ "owner": "a", "n": 1 })).await.unwrap();
        store
            .on_disconnect_remove(&conn, "k", DisconnectGuard::fields([("owner", json!("a"))]))
            .await
            .unwrap();
        store.set("k", json!({ "owner": "a", "n": 2 })).await.unwrap();

        assert_eq!(store.disconnect(&conn).await.unwrap(), 1);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hook_on_unknown_connection_fails() {
        let store = MemoryPresenceStore::new();
        let err = store
            .on_disconnect_remove(&ConnectionId::from("ghost"), "k", DisconnectGuard::Always)
            .await
            .unwrap_err();
        assert!(matches!(err, PresenceError::UnknownConnection(_)));
    }

    #[tokio::test]
    async fn disconnect_unknown_connection_is_noop() {
        let store = MemoryPresenceStore::new();
        assert_eq!(store.disconnect(&ConnectionId::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn watch_starts_at_current_value_and_sees_changes() {
        let store = MemoryPresenceStore::new();
        store.set("k", json!(1)).await.unwrap();

        let mut rx = store.watch("k").await.unwrap();
        assert_eq!(*rx.borrow(), Some(json!(1)));

        store.remove("k").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), None);
    }

    #[tokio::test]
    async fn watch_sees_disconnect_cleanup() {
        let store = MemoryPresenceStore::new();
        let conn = store.connect().await.unwrap();
        store.set("k", json!("held")).await.unwrap();
        store.on_disconnect_remove(&conn, "k", DisconnectGuard::Always).await.unwrap();
        let mut rx = store.watch("k").await.unwrap();

        store.disconnect(&conn).await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), None);
    }

    #[tokio::test]
    async fn dropped_watchers_are_pruned_without_further_writes() {
        let store = MemoryPresenceStore::new();
        store.set("gone", json!(1)).await.unwrap();
        let rx = store.watch("gone").await.unwrap();
        store.remove("gone").await.unwrap();
        drop(rx);

        let _live = store.watch("other").await.unwrap();

        assert_eq!(store.watched_key_count().await, 1);
    }

    #[tokio::test]
    async fn list_filters_by_prefix_in_order() {
        let store = MemoryPresenceStore::new();
        store.set("locks/r1/b", json!(2)).await.unwrap();
        store.set("locks/r1/a", json!(1)).await.unwrap();
        store.set("locks/r2/c", json!(3)).await.unwrap();

        let keys: Vec<String> = store
            .list("locks/r1/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["locks/r1/a", "locks/r1/b"]);
    }
}
