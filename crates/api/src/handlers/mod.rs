pub mod items;
pub mod locks;
pub mod room_state;
pub mod rooms;
pub mod shelves;
