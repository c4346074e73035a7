//! Handlers for shelves and the items in their spots.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use shelfroom_core::shelf::validate_shelf_name;
use shelfroom_db::models::item::PlaceItem;
use shelfroom_db::models::shelf::CreateShelf;
use shelfroom_db::repositories::ShelfRepo;
use shelfroom_events::{event_types, RoomEvent};

use crate::error::AppResult;
use crate::handlers::rooms::require_room;
use crate::middleware::identity::Identity;
use crate::response::{created, DataResponse};
use crate::state::AppState;

/// Query parameters for rendering a shelf.
#[derive(Debug, Deserialize)]
pub struct ShelfViewParams {
    /// Show the "add" affordance on empty spots (default: `true`).
    #[serde(default = "default_true")]
    pub affordances: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/v1/rooms/{room_id}/shelves
pub async fn create_shelf(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(input): Json<CreateShelf>,
) -> AppResult<impl IntoResponse> {
    validate_shelf_name(&input.name)?;
    require_room(&state, &room_id).await?;

    let shelf = ShelfRepo::create(state.documents.as_ref(), &room_id, &input).await?;

    tracing::info!(room_id = %room_id, shelf_id = %shelf.id, user_id = %requester.user_id, "Shelf created");
    state.event_bus.publish(
        RoomEvent::new(event_types::SHELF_CREATED, room_id.clone())
            .with_actor(requester.user_id)
            .with_payload(json!({
                "shelf_id": shelf.id,
                "name": shelf.name,
                "position": shelf.position,
            })),
    );

    Ok(created(shelf))
}

/// GET /api/v1/rooms/{room_id}/shelves
pub async fn list_shelves(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_room(&state, &room_id).await?;
    let shelves = ShelfRepo::list(state.documents.as_ref(), &room_id).await?;
    Ok(Json(DataResponse { data: shelves }))
}

/// GET /api/v1/rooms/{room_id}/shelves/{shelf_id}
///
/// The shelf's spots as the caller sees them.
pub async fn get_shelf(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path((room_id, shelf_id)): Path<(String, String)>,
    Query(params): Query<ShelfViewParams>,
) -> AppResult<impl IntoResponse> {
    let view = state
        .grid
        .view(&room_id, &shelf_id, &requester.user_id, params.affordances)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/rooms/{room_id}/shelves/{shelf_id}/spots/{position}
///
/// Fill an empty spot. Returns 409 if the spot is taken.
pub async fn place_item(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path((room_id, shelf_id, position)): Path<(String, String, u8)>,
    Json(input): Json<PlaceItem>,
) -> AppResult<impl IntoResponse> {
    require_room(&state, &room_id).await?;
    let item = state
        .runtime
        .place(
            &room_id,
            &shelf_id,
            position,
            &input.item_type_id,
            &requester.user_id,
        )
        .await?;
    Ok(created(item))
}

/// DELETE /api/v1/rooms/{room_id}/shelves/{shelf_id}/spots/{position}
///
/// Empty a spot. Returns 409 while another user has the item open.
pub async fn remove_item(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path((room_id, shelf_id, position)): Path<(String, String, u8)>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .runtime
        .remove(&room_id, &shelf_id, position, &requester.user_id)
        .await?;
    Ok(Json(DataResponse { data: item }))
}
