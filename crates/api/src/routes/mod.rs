pub mod health;
pub mod rooms;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                                  WebSocket
///
/// /rooms                                               list, create
/// /rooms/{room_id}                                     get (room + roster)
/// /rooms/{room_id}/members                             join (POST)
/// /rooms/{room_id}/members/{user_id}                   leave (DELETE)
/// /rooms/{room_id}/state                               get, update (PATCH)
///
/// /rooms/{room_id}/shelves                             list, create
/// /rooms/{room_id}/shelves/{shelf_id}                  rendered spots
/// /rooms/{room_id}/shelves/{shelf_id}/spots/{position} place (POST), remove (DELETE)
///
/// /rooms/{room_id}/items/{item_id}                     get
/// /rooms/{room_id}/items/{item_id}/data                update (PATCH)
/// /rooms/{room_id}/items/{item_id}/lock                state, acquire (POST), release (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_handler))
        // Rooms, shelves, items, locks, shared state
        .merge(rooms::router())
}
