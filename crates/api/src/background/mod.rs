//! Background jobs spawned at startup.

pub mod lock_lease;
