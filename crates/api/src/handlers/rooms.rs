//! Handlers for rooms and their rosters.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use shelfroom_core::error::CoreError;
use shelfroom_core::room::{validate_display_name, Room, RosterEntry};
use shelfroom_db::models::room::{CreateRoom, JoinRoom};
use shelfroom_db::paths::validate_segment;
use shelfroom_db::repositories::RoomRepo;
use shelfroom_events::{event_types, RoomEvent};

use crate::error::{AppError, AppResult};
use crate::middleware::identity::Identity;
use crate::response::{created, DataResponse};
use crate::state::AppState;

/// Load a room or fail with 404.
pub(crate) async fn require_room(state: &AppState, room_id: &str) -> AppResult<Room> {
    RoomRepo::get(state.documents.as_ref(), room_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Room", room_id)))
}

/// POST /api/v1/rooms
///
/// Create a room. The caller joins it as its first admin.
pub async fn create_room(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Json(input): Json<CreateRoom>,
) -> AppResult<impl IntoResponse> {
    if let Some(id) = &input.id {
        validate_segment("room", id)?;
    }
    if input.name.trim().is_empty() {
        return Err(CoreError::Validation("room name must not be empty".into()).into());
    }

    let room = RoomRepo::create(state.documents.as_ref(), &input)
        .await?
        .ok_or_else(|| {
            CoreError::Conflict(format!(
                "Room {} already exists",
                input.id.as_deref().unwrap_or_default()
            ))
        })?;

    let creator = RosterEntry {
        user_id: requester.user_id.clone(),
        display_name: requester.display_name.clone(),
        avatar_ref: requester.avatar_ref.clone(),
        is_admin: true,
    };
    let room = RoomRepo::upsert_member(state.documents.as_ref(), &room.id, &creator)
        .await?
        .unwrap_or(room);

    tracing::info!(room_id = %room.id, user_id = %requester.user_id, "Room created");
    Ok(created(room))
}

/// GET /api/v1/rooms
pub async fn list_rooms(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rooms = RoomRepo::list(state.documents.as_ref()).await?;
    Ok(Json(DataResponse { data: rooms }))
}

/// GET /api/v1/rooms/{room_id}
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let room = require_room(&state, &room_id).await?;
    Ok(Json(DataResponse { data: room }))
}

/// POST /api/v1/rooms/{room_id}/members
///
/// Join the roster, or refresh the caller's roster entry. Admin rights can
/// only be granted by an existing admin.
pub async fn join_room(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(input): Json<JoinRoom>,
) -> AppResult<impl IntoResponse> {
    validate_display_name(&input.display_name)?;
    let room = require_room(&state, &room_id).await?;

    let current = room.member(&requester.user_id);
    let already_admin = current.is_some_and(|m| m.is_admin);
    if input.is_admin && !already_admin && !room.roster.is_empty() {
        return Err(CoreError::Forbidden("Only admins can grant admin rights".into()).into());
    }

    let entry = RosterEntry {
        user_id: requester.user_id.clone(),
        display_name: input.display_name.trim().to_string(),
        avatar_ref: input.avatar_ref,
        is_admin: input.is_admin || already_admin,
    };
    let room = RoomRepo::upsert_member(state.documents.as_ref(), &room_id, &entry)
        .await?
        .ok_or_else(|| CoreError::not_found("Room", &room_id))?;

    tracing::info!(room_id = %room_id, user_id = %entry.user_id, "Member joined");
    state.event_bus.publish(
        RoomEvent::new(event_types::ROSTER_CHANGED, room_id.clone())
            .with_actor(entry.user_id.clone())
            .with_payload(json!({ "joined": entry })),
    );

    Ok(Json(DataResponse { data: room }))
}

/// DELETE /api/v1/rooms/{room_id}/members/{user_id}
///
/// Members may remove themselves; admins may remove anyone.
pub async fn leave_room(
    Identity(requester): Identity,
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let room = require_room(&state, &room_id).await?;
    let is_admin = room.member(&requester.user_id).is_some_and(|m| m.is_admin);
    if requester.user_id != user_id && !is_admin {
        return Err(CoreError::Forbidden("Only admins can remove other members".into()).into());
    }

    let removed = RoomRepo::remove_member(state.documents.as_ref(), &room_id, &user_id).await?;
    if !removed {
        return Err(CoreError::not_found("Member", &user_id).into());
    }

    tracing::info!(room_id = %room_id, user_id = %user_id, actor = %requester.user_id, "Member left");
    state.event_bus.publish(
        RoomEvent::new(event_types::ROSTER_CHANGED, room_id.clone())
            .with_actor(requester.user_id)
            .with_payload(json!({ "left": user_id })),
    );

    Ok(StatusCode::NO_CONTENT)
}
