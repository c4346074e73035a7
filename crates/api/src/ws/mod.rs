//! WebSocket infrastructure for real-time collaboration.
//!
//! Provides connection management, the lock/room protocol handler, heartbeat
//! and lease renewal, and room event fan-out.

mod fanout;
mod handler;
mod heartbeat;
pub mod manager;

pub use fanout::RoomEventFanout;
pub use handler::ws_handler;
pub use heartbeat::{renew_held_locks, start_heartbeat};
pub use manager::WsManager;
