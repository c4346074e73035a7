//! Shelfroom event bus.
//!
//! [`EventBus`] is an in-process publish/subscribe hub backed by
//! `tokio::sync::broadcast`. Room services publish [`RoomEvent`]s on it and
//! the API fans them out to the WebSocket connections joined to the room.

pub mod bus;

pub use bus::{event_types, EventBus, RoomEvent};
