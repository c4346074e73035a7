//! Exclusive item locks: records, states, outcomes, and the real-time
//! collaboration message protocol.
//!
//! This module lives in `core` (zero internal deps) so that the store layer,
//! the room services, and the WebSocket handlers all agree on the lock record
//! shape, the presence key layout, and the wire protocol.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::item::ItemRef;
use crate::room::validate_display_name;
use crate::types::{ItemId, Millis, RoomId, UserId};

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// Default interval between WebSocket heartbeats and lease renewals.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// With leases enabled, a record not renewed for this many heartbeat
/// intervals is treated as abandoned.
pub const LEASE_HEARTBEAT_MULTIPLIER: u32 = 2;

/// Generic message shown on a spot when an item could not be opened.
pub const OPEN_FAILED_MESSAGE: &str = "Couldn't open this item";

// ---------------------------------------------------------------------------
// Presence keys
// ---------------------------------------------------------------------------

/// Prefix under which every lock record lives in the presence store.
pub const LOCK_KEY_PREFIX: &str = "locks/";

/// Presence store key holding the lock record for `item`.
pub fn lock_key(item: &ItemRef) -> String {
    format!("{LOCK_KEY_PREFIX}{}/{}", item.room_id, item.item_id)
}

/// Inverse of [`lock_key`]. Returns `None` for keys outside the lock space.
pub fn parse_lock_key(key: &str) -> Option<ItemRef> {
    let rest = key.strip_prefix(LOCK_KEY_PREFIX)?;
    let (room_id, item_id) = rest.split_once('/')?;
    if room_id.is_empty() || item_id.is_empty() || item_id.contains('/') {
        return None;
    }
    Some(ItemRef::new(room_id, item_id))
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// The user asking for a lock, with the identity snapshot written into the
/// record on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

impl Requester {
    pub fn new(
        user_id: impl Into<UserId>,
        display_name: impl Into<String>,
        avatar_ref: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            avatar_ref,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::Validation("user id must not be empty".into()));
        }
        validate_display_name(&self.display_name)
    }
}

/// Public view of who holds a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderInfo {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub acquired_at_millis: Millis,
}

// ---------------------------------------------------------------------------
// Lock records
// ---------------------------------------------------------------------------

/// Value stored in the presence store under [`lock_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub holder_user_id: UserId,
    pub holder_display_name: String,
    pub holder_avatar_ref: Option<String>,
    pub acquired_at_millis: Millis,
    /// Last lease renewal. Absent until the first renewal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewed_at_millis: Option<Millis>,
    /// Connection whose disconnect hook owns this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_connection_id: Option<String>,
}

impl LockRecord {
    pub fn new(requester: &Requester, now: Millis) -> Self {
        Self {
            holder_user_id: requester.user_id.clone(),
            holder_display_name: requester.display_name.clone(),
            holder_avatar_ref: requester.avatar_ref.clone(),
            acquired_at_millis: now,
            renewed_at_millis: None,
            holder_connection_id: None,
        }
    }

    /// Bind the record to the connection that will clean it up.
    pub fn bound_to(self, conn: impl Into<String>) -> Self {
        Self {
            holder_connection_id: Some(conn.into()),
            ..self
        }
    }

    pub fn is_bound_to(&self, conn: &str) -> bool {
        self.holder_connection_id.as_deref() == Some(conn)
    }

    pub fn is_held_by(&self, user_id: &str) -> bool {
        self.holder_user_id == user_id
    }

    pub fn holder(&self) -> HolderInfo {
        HolderInfo {
            user_id: self.holder_user_id.clone(),
            display_name: self.holder_display_name.clone(),
            avatar_ref: self.holder_avatar_ref.clone(),
            acquired_at_millis: self.acquired_at_millis,
        }
    }

    /// Most recent sign of life from the holder.
    pub fn last_seen_millis(&self) -> Millis {
        self.renewed_at_millis.unwrap_or(self.acquired_at_millis)
    }

    /// `true` when a lease is configured and the holder has not renewed
    /// within it. Without a lease a record is never abandoned.
    pub fn is_abandoned(&self, now: Millis, lease: Option<LockLease>) -> bool {
        match lease {
            Some(lease) => now - self.last_seen_millis() > lease.abandon_after_millis(),
            None => false,
        }
    }
}

/// Heartbeat lease used when the presence service cannot run disconnect
/// hooks for a connection (for example under a network partition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockLease {
    pub heartbeat: Duration,
}

impl LockLease {
    pub fn new(heartbeat: Duration) -> Self {
        Self { heartbeat }
    }

    pub fn abandon_after(&self) -> Duration {
        self.heartbeat * LEASE_HEARTBEAT_MULTIPLIER
    }

    pub fn abandon_after_millis(&self) -> Millis {
        Millis::try_from(self.abandon_after().as_millis()).unwrap_or(Millis::MAX)
    }
}

/// What a reader observes for one item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Unlocked,
    Locked { record: LockRecord },
}

impl LockState {
    /// Build the reader's view of a raw record, hiding abandoned leases.
    pub fn observe(record: Option<LockRecord>, now: Millis, lease: Option<LockLease>) -> Self {
        match record {
            Some(record) if !record.is_abandoned(now, lease) => Self::Locked { record },
            _ => Self::Unlocked,
        }
    }

    pub fn record(&self) -> Option<&LockRecord> {
        match self {
            Self::Locked { record } => Some(record),
            Self::Unlocked => None,
        }
    }

    pub fn holder(&self) -> Option<HolderInfo> {
        self.record().map(LockRecord::holder)
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    pub fn is_locked_by(&self, user_id: &str) -> bool {
        self.record().is_some_and(|r| r.is_held_by(user_id))
    }

    pub fn is_locked_by_other(&self, user_id: &str) -> bool {
        self.record().is_some_and(|r| !r.is_held_by(user_id))
    }
}

// ---------------------------------------------------------------------------
// Acquire outcome
// ---------------------------------------------------------------------------

/// Result of an acquire attempt. Store failures are folded in as a denied
/// outcome carrying `error`; they never surface as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireOutcome {
    pub granted: bool,
    pub holder: Option<HolderInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AcquireOutcome {
    pub fn granted(holder: HolderInfo) -> Self {
        Self {
            granted: true,
            holder: Some(holder),
            error: None,
        }
    }

    pub fn denied(holder: Option<HolderInfo>) -> Self {
        Self {
            granted: false,
            holder,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            granted: false,
            holder: None,
            error: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaboration WebSocket message protocol
// ---------------------------------------------------------------------------

/// Messages exchanged over WebSocket for real-time collaboration.
///
/// Serialized as JSON with an internally-tagged `"type"` discriminator so
/// that clients can route messages by type string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CollabMessage {
    /// Server sends once per connection: the presence connection id.
    #[serde(rename = "session.ready")]
    SessionReady { connection_id: String },

    /// Client sends: who is on the other end of this socket.
    #[serde(rename = "session.identify")]
    SessionIdentify {
        user_id: UserId,
        display_name: String,
        #[serde(default)]
        avatar_ref: Option<String>,
    },

    /// Client sends: deliver room events for this room.
    #[serde(rename = "room.join")]
    RoomJoin { room_id: RoomId },

    /// Client sends: stream lock state for an item.
    #[serde(rename = "lock.watch")]
    LockWatch { room_id: RoomId, item_id: ItemId },

    /// Client sends: stop streaming lock state for an item.
    #[serde(rename = "lock.unwatch")]
    LockUnwatch { room_id: RoomId, item_id: ItemId },

    /// Client sends: acquire the item's lock for the identified user.
    #[serde(rename = "lock.acquire")]
    LockAcquire { room_id: RoomId, item_id: ItemId },

    /// Client sends: release the item's lock.
    #[serde(rename = "lock.release")]
    LockRelease { room_id: RoomId, item_id: ItemId },

    /// Server sends: current lock state of a watched item.
    #[serde(rename = "lock.state")]
    LockStateChanged {
        room_id: RoomId,
        item_id: ItemId,
        holder: Option<HolderInfo>,
    },

    /// Server sends to the requesting client: the lock is yours.
    #[serde(rename = "lock.granted")]
    LockGranted {
        room_id: RoomId,
        item_id: ItemId,
        holder: HolderInfo,
    },

    /// Server sends to the requesting client: lock acquisition denied.
    #[serde(rename = "lock.denied")]
    LockDenied {
        room_id: RoomId,
        item_id: ItemId,
        holder: Option<HolderInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Server broadcasts: something changed in a joined room.
    #[serde(rename = "room.event")]
    RoomEvent {
        event_type: String,
        room_id: RoomId,
        payload: serde_json::Value,
    },

    /// Server sends: the last client message could not be handled.
    #[serde(rename = "error")]
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
