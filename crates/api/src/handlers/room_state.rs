//! Handlers for a room's shared fields.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use shelfroom_core::room::RoomFields;

use crate::error::AppResult;
use crate::middleware::identity::Identity;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/rooms/{room_id}/state
pub async fn get_state(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let fields = state.room_state.fields(&room_id).await?;
    Ok(Json(DataResponse { data: fields }))
}

/// PATCH /api/v1/rooms/{room_id}/state
///
/// Each field in the body replaces the stored one; fields not mentioned
/// are left alone.
pub async fn update_state(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(fields): Json<RoomFields>,
) -> AppResult<impl IntoResponse> {
    let merged = state
        .room_state
        .set_fields(&room_id, fields, Some(&requester.user_id))
        .await?;
    Ok(Json(DataResponse { data: merged }))
}
