//! Shelfroom domain core.
//!
//! Pure types and rules shared by every other crate: ids, errors, the item
//! catalog, placed items, rooms and shelves, lock records and the real-time
//! message protocol, spot rendering and tap routing, and the item behavior
//! contract with its built-in behaviors. Nothing in here performs I/O.

pub mod behavior;
pub mod catalog;
pub mod collaboration;
pub mod error;
pub mod item;
pub mod items;
pub mod room;
pub mod shelf;
pub mod types;
