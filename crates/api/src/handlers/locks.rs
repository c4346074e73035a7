//! Handlers for item locks.
//!
//! Acquire and release are scoped to a presence connection, passed as the
//! `x-connection-id` header (the id from the WebSocket `session.ready`
//! message). A lock acquired this way is dropped when that socket closes.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use shelfroom_core::collaboration::{AcquireOutcome, HolderInfo};
use shelfroom_core::error::CoreError;
use shelfroom_core::item::ItemRef;
use shelfroom_db::PresenceError;

use crate::error::{AppError, AppResult};
use crate::middleware::identity::{Connection, Identity};
use crate::response::DataResponse;
use crate::state::AppState;

/// Lock state as reported to readers.
#[derive(Debug, Serialize)]
pub struct LockStatusResponse {
    pub locked: bool,
    pub holder: Option<HolderInfo>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// GET /api/v1/rooms/{room_id}/items/{item_id}/lock
pub async fn get_lock(
    State(state): State<AppState>,
    Path((room_id, item_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let lock = state.locks.state(&ItemRef::new(room_id, item_id)).await?;
    Ok(Json(DataResponse {
        data: LockStatusResponse {
            locked: lock.is_locked(),
            holder: lock.holder(),
        },
    }))
}

/// POST /api/v1/rooms/{room_id}/items/{item_id}/lock
///
/// Returns 400 for item types opened without a lock, 409 naming the holder
/// when someone else has the item open, and 503 when the lock could not be
/// taken.
pub async fn acquire_lock(
    Identity(requester): Identity,
    Connection(conn): Connection,
    State(state): State<AppState>,
    Path((room_id, item_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    if !state.presence.is_connected(&conn).await? {
        return Err(PresenceError::UnknownConnection(conn).into());
    }
    let item = ItemRef::new(room_id, item_id);
    let outcome: AcquireOutcome = state
        .runtime
        .acquire_lock(&conn, &item, &requester)
        .await?;

    if outcome.granted {
        state.ws_manager.track_lock(&conn, &item).await;
        return Ok(Json(DataResponse { data: outcome }));
    }
    match (outcome.holder, outcome.error) {
        (_, Some(error)) => Err(AppError::ServiceUnavailable(error)),
        (Some(holder), None) => Err(CoreError::Conflict(format!(
            "Item is open by {}",
            holder.display_name
        ))
        .into()),
        (None, None) => Err(AppError::InternalError(
            "Lock denied without a holder".into(),
        )),
    }
}

/// DELETE /api/v1/rooms/{room_id}/items/{item_id}/lock
///
/// Only the holder's own lock is removed; anything else is a no-op.
pub async fn release_lock(
    Identity(requester): Identity,
    Connection(conn): Connection,
    State(state): State<AppState>,
    Path((room_id, item_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let item = ItemRef::new(room_id, item_id);
    let released = state.locks.release(&conn, &item, &requester.user_id).await;
    state.ws_manager.untrack_lock(&conn, &item).await;
    Ok(Json(DataResponse {
        data: ReleaseResponse { released },
    }))
}
