//! Repository for room-wide shared fields.
//!
//! Fields are top-level keys of one document and are merged individually, so
//! concurrent writers to different fields do not clobber each other and
//! concurrent writers to the same field resolve last-writer-wins.

use serde_json::{Map, Value};
use shelfroom_core::room::RoomFields;

use crate::documents::{DocumentError, DocumentStore};
use crate::paths;
use crate::tx::TxDecision;

pub struct RoomStateRepo;

impl RoomStateRepo {
    /// Create the empty state document for a new room.
    pub async fn init(store: &dyn DocumentStore, room_id: &str) -> Result<(), DocumentError> {
        store
            .set(&paths::room_state(room_id), Value::Object(Map::new()))
            .await?;
        Ok(())
    }

    /// Current fields. A room without a state document has no fields.
    pub async fn get(store: &dyn DocumentStore, room_id: &str) -> Result<RoomFields, DocumentError> {
        let fields = match store.get(&paths::room_state(room_id)).await? {
            Some(doc) => match doc.body {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            None => Map::new(),
        };
        Ok(fields)
    }

    /// Merge `fields` into the room state and return the merged result.
    ///
    /// Creating the document and merging into it happen in one transaction,
    /// so a first write racing another first write cannot drop its fields.
    pub async fn merge(
        store: &dyn DocumentStore,
        room_id: &str,
        fields: RoomFields,
    ) -> Result<RoomFields, DocumentError> {
        let path = paths::room_state(room_id);
        let outcome = store
            .transaction(&path, &|current| {
                let mut body = match current.map(|doc| &doc.body) {
                    None => Map::new(),
                    Some(Value::Object(map)) => map.clone(),
                    Some(_) => return TxDecision::Abort,
                };
                body.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                TxDecision::Set(Value::Object(body))
            })
            .await?;

        match outcome.value.map(|doc| doc.body) {
            Some(Value::Object(map)) if outcome.committed => Ok(map),
            _ => Err(DocumentError::NotAnObject(path)),
        }
    }
}
