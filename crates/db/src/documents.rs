//! Durable, path-addressed document store.
//!
//! Paths are `/`-separated segments (`rooms/r1/items/i9`). A document's
//! parent is its path minus the last segment; [`DocumentStore::list`] returns
//! the direct children of a parent. Every write bumps `version`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use shelfroom_core::types::Timestamp;
use tokio::sync::RwLock;

use crate::tx::{TxDecision, TxOutcome};

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Document {
    pub path: String,
    pub body: Value,
    pub version: i64,
    pub updated_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Document body must be a JSON object: {0}")]
    NotAnObject(String),

    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document transport error: {0}")]
    Transport(String),
}

/// Decision function run inside [`DocumentStore::transaction`].
pub type DocumentDecide<'a> = &'a (dyn Fn(Option<&Document>) -> TxDecision + Send + Sync);

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Document>, DocumentError>;

    /// Create or replace a document.
    async fn set(&self, path: &str, body: Value) -> Result<Document, DocumentError>;

    /// Merge `partial` into the top level of an existing document.
    async fn update(&self, path: &str, partial: Map<String, Value>)
        -> Result<Document, DocumentError>;

    /// Returns `true` if the document existed.
    async fn delete(&self, path: &str) -> Result<bool, DocumentError>;

    /// Direct children of `parent`, in path order.
    async fn list(&self, parent: &str) -> Result<Vec<Document>, DocumentError>;

    /// Atomically read `path`, let `decide` choose, and apply the decision.
    async fn transaction(
        &self,
        path: &str,
        decide: DocumentDecide<'_>,
    ) -> Result<TxOutcome<Document>, DocumentError>;

    async fn health_check(&self) -> Result<(), DocumentError>;
}

/// Validate a document path and return its parent.
pub fn parent_of(path: &str) -> Result<&str, DocumentError> {
    if path.is_empty() || path.split('/').any(str::is_empty) {
        return Err(DocumentError::InvalidPath(path.to_string()));
    }
    Ok(path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or(""))
}

fn require_object(path: &str, body: &Value) -> Result<(), DocumentError> {
    if body.is_object() {
        Ok(())
    } else {
        Err(DocumentError::NotAnObject(path.to_string()))
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Process-local document store, used for tests and single-node deployments
/// without `DATABASE_URL`.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<String, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn write_doc(docs: &mut BTreeMap<String, Document>, path: &str, body: Value) -> Document {
    let version = docs.get(path).map(|d| d.version + 1).unwrap_or(1);
    let doc = Document {
        path: path.to_string(),
        body,
        version,
        updated_at: chrono::Utc::now(),
    };
    docs.insert(path.to_string(), doc.clone());
    doc
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, DocumentError> {
        parent_of(path)?;
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, body: Value) -> Result<Document, DocumentError> {
        parent_of(path)?;
        require_object(path, &body)?;
        Ok(write_doc(&mut *self.docs.write().await, path, body))
    }

    async fn update(
        &self,
        path: &str,
        partial: Map<String, Value>,
    ) -> Result<Document, DocumentError> {
        parent_of(path)?;
        let mut docs = self.docs.write().await;
        let mut body = docs
            .get(path)
            .map(|d| d.body.clone())
            .ok_or_else(|| DocumentError::NotFound(path.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.extend(partial);
        }
        Ok(write_doc(&mut docs, path, body))
    }

    async fn delete(&self, path: &str) -> Result<bool, DocumentError> {
        parent_of(path)?;
        Ok(self.docs.write().await.remove(path).is_some())
    }

    async fn list(&self, parent: &str) -> Result<Vec<Document>, DocumentError> {
        let prefix = format!("{parent}/");
        let docs = self.docs.read().await;
        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn transaction(
        &self,
        path: &str,
        decide: DocumentDecide<'_>,
    ) -> Result<TxOutcome<Document>, DocumentError> {
        parent_of(path)?;
        let mut docs = self.docs.write().await;
        let current = docs.get(path).cloned();

        match decide(current.as_ref()) {
            TxDecision::Abort => Ok(TxOutcome::aborted(current)),
            TxDecision::Keep => Ok(TxOutcome::committed(current)),
            TxDecision::Set(body) => {
                require_object(path, &body)?;
                Ok(TxOutcome::committed(Some(write_doc(&mut docs, path, body))))
            }
            TxDecision::Remove => {
                docs.remove(path);
                Ok(TxOutcome::committed(None))
            }
        }
    }

    async fn health_check(&self) -> Result<(), DocumentError> {
        Ok(())
    }
}
