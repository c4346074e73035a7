//! Repository for room documents and their rosters.

use shelfroom_core::room::{Room, RosterEntry};
use shelfroom_core::types::new_id;

use super::{decode, RoomStateRepo};
use crate::documents::{Document, DocumentError, DocumentStore};
use crate::models::room::CreateRoom;
use crate::paths;
use crate::tx::TxDecision;

pub struct RoomRepo;

impl RoomRepo {
    /// Create a room and its empty shared-state document.
    ///
    /// Returns `None` if a room with the requested id already exists.
    pub async fn create(
        store: &dyn DocumentStore,
        input: &CreateRoom,
    ) -> Result<Option<Room>, DocumentError> {
        let room = Room {
            id: input.id.clone().unwrap_or_else(new_id),
            name: input.name.trim().to_string(),
            roster: Vec::new(),
            created_at: chrono::Utc::now(),
        };
        let body = serde_json::to_value(&room)?;

        let outcome = store
            .transaction(&paths::room(&room.id), &|current| match current {
                None => TxDecision::Set(body.clone()),
                Some(_) => TxDecision::Abort,
            })
            .await?;
        if !outcome.committed {
            return Ok(None);
        }

        RoomStateRepo::init(store, &room.id).await?;
        Ok(Some(room))
    }

    pub async fn get(
        store: &dyn DocumentStore,
        room_id: &str,
    ) -> Result<Option<Room>, DocumentError> {
        store
            .get(&paths::room(room_id))
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn list(store: &dyn DocumentStore) -> Result<Vec<Room>, DocumentError> {
        store
            .list(paths::ROOMS)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Add `entry` to the roster, replacing any entry for the same user.
    ///
    /// Returns `None` if the room does not exist.
    pub async fn upsert_member(
        store: &dyn DocumentStore,
        room_id: &str,
        entry: &RosterEntry,
    ) -> Result<Option<Room>, DocumentError> {
        let outcome = store
            .transaction(&paths::room(room_id), &|current| {
                edit_room(current, |room| {
                    match room.roster.iter_mut().find(|m| m.user_id == entry.user_id) {
                        Some(member) => *member = entry.clone(),
                        None => room.roster.push(entry.clone()),
                    }
                    true
                })
            })
            .await?;
        outcome.value.map(decode).transpose()
    }

    /// Remove a user from the roster. Returns `true` if they were a member.
    pub async fn remove_member(
        store: &dyn DocumentStore,
        room_id: &str,
        user_id: &str,
    ) -> Result<bool, DocumentError> {
        let outcome = store
            .transaction(&paths::room(room_id), &|current| {
                edit_room(current, |room| {
                    let before = room.roster.len();
                    room.roster.retain(|m| m.user_id != user_id);
                    room.roster.len() != before
                })
            })
            .await?;
        Ok(outcome.committed)
    }
}

/// Apply `edit` to the room in `current`. The edit returns whether it changed
/// anything; unchanged rooms abort so no write happens.
fn edit_room(current: Option<&Document>, edit: impl FnOnce(&mut Room) -> bool) -> TxDecision {
    let Some(doc) = current else {
        return TxDecision::Abort;
    };
    let Ok(mut room) = serde_json::from_value::<Room>(doc.body.clone()) else {
        return TxDecision::Abort;
    };
    if !edit(&mut room) {
        return TxDecision::Abort;
    }
    match serde_json::to_value(&room) {
        Ok(body) => TxDecision::Set(body),
        Err(_) => TxDecision::Abort,
    }
}
