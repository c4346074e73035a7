//! Conditional-write primitives shared by both stores.

use serde_json::Value;

/// What a transaction decides after reading the current value.
#[derive(Debug, Clone, PartialEq)]
pub enum TxDecision {
    /// Leave the value untouched and report the transaction as not committed.
    Abort,
    /// Leave the value untouched but report the transaction as committed.
    Keep,
    /// Replace the value.
    Set(Value),
    /// Delete the value.
    Remove,
}

/// Result of a transaction: whether it committed and the value that is in
/// place afterwards (the unchanged current value when aborted).
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutcome<T> {
    pub committed: bool,
    pub value: Option<T>,
}

impl<T> TxOutcome<T> {
    pub fn committed(value: Option<T>) -> Self {
        Self {
            committed: true,
            value,
        }
    }

    pub fn aborted(value: Option<T>) -> Self {
        Self {
            committed: false,
            value,
        }
    }
}
