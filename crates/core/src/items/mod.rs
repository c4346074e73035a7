//! Built-in item behaviors.
//!
//! Gameplay inside each item is deliberately thin; these exist so the
//! runtime has real behaviors to host.

pub mod clock;
pub mod guestbook;
pub mod pet;
pub mod plant;
pub mod sketchpad;

use serde_json::Value;

use crate::error::CoreError;
use crate::item::ItemData;

fn int_field(data: &ItemData, key: &str) -> i64 {
    data.get(key).and_then(Value::as_i64).unwrap_or_default()
}

fn str_field<'a>(data: &'a ItemData, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Reject any key in `partial` that is not in `allowed`.
fn only_keys(item_type_id: &str, partial: &ItemData, allowed: &[&str]) -> Result<(), CoreError> {
    match partial.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(CoreError::Validation(format!(
            "{item_type_id} does not have a '{key}' field"
        ))),
        None => Ok(()),
    }
}

/// Require `key`, when present in `partial`, to be an integer in `range`.
fn int_in_range(
    partial: &ItemData,
    key: &str,
    range: std::ops::RangeInclusive<i64>,
) -> Result<(), CoreError> {
    match partial.get(key) {
        None => Ok(()),
        Some(value) => match value.as_i64() {
            Some(n) if range.contains(&n) => Ok(()),
            _ => Err(CoreError::Validation(format!(
                "{key} must be an integer between {} and {}",
                range.start(),
                range.end()
            ))),
        },
    }
}
