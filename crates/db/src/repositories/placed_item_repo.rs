//! Repository for placed items.

use serde_json::{Map, Value};
use shelfroom_core::item::{merge_item_data, ItemData, PlacedItem};

use super::decode;
use crate::documents::{Document, DocumentError, DocumentStore};
use crate::paths;
use crate::tx::TxDecision;

/// Result of writing an item's data.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemDataWrite {
    Written(PlacedItem),
    Missing,
    /// The item moved past the expected version; carries the current item.
    Stale(PlacedItem),
}

pub struct PlacedItemRepo;

/// Decode an item document, taking `version` from the document itself.
fn decode_item(doc: Document) -> Result<PlacedItem, DocumentError> {
    let version = doc.version;
    let mut item: PlacedItem = decode(doc)?;
    item.version = version;
    Ok(item)
}

impl PlacedItemRepo {
    /// Store a freshly placed item. Fails if the id is already taken.
    pub async fn insert(
        store: &dyn DocumentStore,
        item: &PlacedItem,
    ) -> Result<PlacedItem, DocumentError> {
        let path = paths::item(&item.room_id, &item.id);
        let body = serde_json::to_value(item)?;
        let outcome = store
            .transaction(&path, &|current| match current {
                None => TxDecision::Set(body.clone()),
                Some(_) => TxDecision::Abort,
            })
            .await?;
        match (outcome.committed, outcome.value) {
            (true, Some(doc)) => decode_item(doc),
            _ => Err(DocumentError::Transport(format!("{path} already exists"))),
        }
    }

    pub async fn get(
        store: &dyn DocumentStore,
        room_id: &str,
        item_id: &str,
    ) -> Result<Option<PlacedItem>, DocumentError> {
        store
            .get(&paths::item(room_id, item_id))
            .await?
            .map(decode_item)
            .transpose()
    }

    pub async fn list(
        store: &dyn DocumentStore,
        room_id: &str,
    ) -> Result<Vec<PlacedItem>, DocumentError> {
        store
            .list(&paths::items(room_id))
            .await?
            .into_iter()
            .map(decode_item)
            .collect()
    }

    pub async fn delete(
        store: &dyn DocumentStore,
        room_id: &str,
        item_id: &str,
    ) -> Result<bool, DocumentError> {
        store.delete(&paths::item(room_id, item_id)).await
    }

    /// Merge `partial` into the item's data.
    ///
    /// Without `expected_version` concurrent writers resolve last-writer-wins
    /// per top-level key. With it, the write only lands if nobody else wrote
    /// since that version.
    pub async fn write_item_data(
        store: &dyn DocumentStore,
        room_id: &str,
        item_id: &str,
        partial: &ItemData,
        expected_version: Option<i64>,
    ) -> Result<ItemDataWrite, DocumentError> {
        let path = paths::item(room_id, item_id);
        let now = serde_json::to_value(chrono::Utc::now())?;

        let Some(expected) = expected_version else {
            return Self::merge_unchecked(store, &path, partial, now).await;
        };

        let outcome = store
            .transaction(&path, &|current| {
                let Some(doc) = current else {
                    return TxDecision::Abort;
                };
                if doc.version != expected {
                    return TxDecision::Abort;
                }
                let Ok(mut item) = serde_json::from_value::<PlacedItem>(doc.body.clone()) else {
                    return TxDecision::Abort;
                };
                merge_item_data(&mut item.item_data, partial);
                let mut body = match serde_json::to_value(&item) {
                    Ok(body) => body,
                    Err(_) => return TxDecision::Abort,
                };
                if let Value::Object(map) = &mut body {
                    map.insert("updated_at".into(), now.clone());
                }
                TxDecision::Set(body)
            })
            .await?;

        match (outcome.committed, outcome.value) {
            (_, None) => Ok(ItemDataWrite::Missing),
            (true, Some(doc)) => Ok(ItemDataWrite::Written(decode_item(doc)?)),
            (false, Some(doc)) => Ok(ItemDataWrite::Stale(decode_item(doc)?)),
        }
    }

    async fn merge_unchecked(
        store: &dyn DocumentStore,
        path: &str,
        partial: &ItemData,
        now: Value,
    ) -> Result<ItemDataWrite, DocumentError> {
        // item_data is one top-level key of the item document, so a plain
        // document merge would replace it wholesale. Merge inside it instead.
        let outcome = store
            .transaction(path, &|current| {
                let Some(doc) = current else {
                    return TxDecision::Abort;
                };
                let mut body = doc.body.clone();
                let Some(map) = body.as_object_mut() else {
                    return TxDecision::Abort;
                };
                let data = map
                    .entry("item_data")
                    .or_insert_with(|| Value::Object(Map::new()));
                match data.as_object_mut() {
                    Some(data) => merge_item_data(data, partial),
                    None => *data = Value::Object(partial.clone()),
                }
                map.insert("updated_at".into(), now.clone());
                TxDecision::Set(body)
            })
            .await?;

        match outcome.value {
            Some(doc) if outcome.committed => Ok(ItemDataWrite::Written(decode_item(doc)?)),
            _ => Ok(ItemDataWrite::Missing),
        }
    }
}
