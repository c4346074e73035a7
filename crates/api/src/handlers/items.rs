//! Handlers for placed items and their data.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use shelfroom_core::behavior::ItemView;
use shelfroom_core::item::PlacedItem;
use shelfroom_db::models::item::UpdateItemData;

use crate::error::AppResult;
use crate::handlers::rooms::require_room;
use crate::middleware::identity::Identity;
use crate::response::DataResponse;
use crate::state::AppState;

/// A placed item with its inactive rendering.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub item: PlacedItem,
    pub view: ItemView,
}

/// GET /api/v1/rooms/{room_id}/items/{item_id}
pub async fn get_item(
    State(state): State<AppState>,
    Path((room_id, item_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let room = require_room(&state, &room_id).await?;
    let item = state.runtime.get(&room_id, &item_id).await?;
    let view = state.runtime.render(&item, &room.info(), false)?;
    Ok(Json(DataResponse {
        data: ItemResponse { item, view },
    }))
}

/// PATCH /api/v1/rooms/{room_id}/items/{item_id}/data
///
/// Merge top-level keys into the item's data. With `expected_version` the
/// write is rejected with 409 when the item changed in between.
pub async fn update_item_data(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path((room_id, item_id)): Path<(String, String)>,
    Json(input): Json<UpdateItemData>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .runtime
        .update_item_data(
            &room_id,
            &item_id,
            input.data,
            input.expected_version,
            &requester.user_id,
        )
        .await?;
    Ok(Json(DataResponse { data: item }))
}
