//! Route definitions for rooms and everything inside them.

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::handlers::{items, locks, room_state, rooms, shelves};
use crate::state::AppState;

/// Room routes, merged into the `/api/v1` tree.
///
/// ```text
/// GET, POST          /rooms                                        -> list_rooms, create_room
/// GET                /rooms/{room_id}                              -> get_room
/// POST               /rooms/{room_id}/members                      -> join_room
/// DELETE             /rooms/{room_id}/members/{user_id}            -> leave_room
/// GET, PATCH         /rooms/{room_id}/state                        -> get_state, update_state
/// GET, POST          /rooms/{room_id}/shelves                      -> list_shelves, create_shelf
/// GET                /rooms/{room_id}/shelves/{shelf_id}           -> get_shelf
/// POST, DELETE       /rooms/{room_id}/shelves/{shelf_id}/spots/{p} -> place_item, remove_item
/// GET                /rooms/{room_id}/items/{item_id}              -> get_item
/// PATCH              /rooms/{room_id}/items/{item_id}/data         -> update_item_data
/// GET, POST, DELETE  /rooms/{room_id}/items/{item_id}/lock         -> get_lock, acquire_lock, release_lock
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route("/rooms/{room_id}", get(rooms::get_room))
        .route("/rooms/{room_id}/members", post(rooms::join_room))
        .route(
            "/rooms/{room_id}/members/{user_id}",
            delete(rooms::leave_room),
        )
        .route(
            "/rooms/{room_id}/state",
            get(room_state::get_state).patch(room_state::update_state),
        )
        .route(
            "/rooms/{room_id}/shelves",
            get(shelves::list_shelves).post(shelves::create_shelf),
        )
        .route("/rooms/{room_id}/shelves/{shelf_id}", get(shelves::get_shelf))
        .route(
            "/rooms/{room_id}/shelves/{shelf_id}/spots/{position}",
            post(shelves::place_item).delete(shelves::remove_item),
        )
        .route("/rooms/{room_id}/items/{item_id}", get(items::get_item))
        .route(
            "/rooms/{room_id}/items/{item_id}/data",
            patch(items::update_item_data),
        )
        .route(
            "/rooms/{room_id}/items/{item_id}/lock",
            get(locks::get_lock)
                .post(locks::acquire_lock)
                .delete(locks::release_lock),
        )
}
