//! Room services built on the presence and document stores.
//!
//! - [`LockCoordinator`] — exclusive interactive access to one lockable item.
//! - [`ItemRuntime`] / [`ActiveItem`] — placement, removal and the
//!   open/update/close lifecycle of items, dispatched to item behaviors.
//! - [`ShelfGrid`] — spot rendering and tap handling for one shelf.
//! - [`RoomStateSync`] — room-wide shared fields, last-writer-wins.
//!
//! Stores and the event bus are constructed once at startup and injected.

pub mod error;
pub mod grid;
pub mod lock;
pub mod room_state;
pub mod runtime;

pub use error::RoomError;
pub use grid::{PressOutcome, ShelfGrid, ShelfView};
pub use lock::{LockCoordinator, LockWatch, Subscription};
pub use room_state::RoomStateSync;
pub use runtime::{ActiveItem, ItemRuntime, OpenOutcome};
