//! PostgreSQL-backed [`DocumentStore`] storing bodies as JSONB.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::documents::{parent_of, Document, DocumentDecide, DocumentError, DocumentStore};
use crate::tx::{TxDecision, TxOutcome};

/// Column list for `documents` queries.
const DOC_COLUMNS: &str = "path, body, version, updated_at";

/// Attempts before a contended transaction gives up.
const MAX_TX_ATTEMPTS: usize = 5;

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// One attempt of [`DocumentStore::transaction`]. Returns `None` when a
    /// concurrent insert won the race for a missing row and the attempt
    /// should be retried.
    async fn try_transaction(
        &self,
        path: &str,
        parent: &str,
        decide: DocumentDecide<'_>,
    ) -> Result<Option<TxOutcome<Document>>, DocumentError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {DOC_COLUMNS} FROM documents WHERE path = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Document>(&query)
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match decide(current.as_ref()) {
            TxDecision::Abort => TxOutcome::aborted(current),
            TxDecision::Keep => TxOutcome::committed(current),
            TxDecision::Set(body) => {
                if !body.is_object() {
                    return Err(DocumentError::NotAnObject(path.to_string()));
                }
                let written = if current.is_some() {
                    let query = format!(
                        "UPDATE documents SET body = $2, version = version + 1, updated_at = NOW() \
                         WHERE path = $1 RETURNING {DOC_COLUMNS}"
                    );
                    sqlx::query_as::<_, Document>(&query)
                        .bind(path)
                        .bind(&body)
                        .fetch_optional(&mut *tx)
                        .await?
                } else {
                    let query = format!(
                        "INSERT INTO documents (path, parent, body) VALUES ($1, $2, $3) \
                         ON CONFLICT (path) DO NOTHING \
                         RETURNING {DOC_COLUMNS}"
                    );
                    sqlx::query_as::<_, Document>(&query)
                        .bind(path)
                        .bind(parent)
                        .bind(&body)
                        .fetch_optional(&mut *tx)
                        .await?
                };
                match written {
                    Some(doc) => TxOutcome::committed(Some(doc)),
                    None => {
                        tx.rollback().await?;
                        return Ok(None);
                    }
                }
            }
            TxDecision::Remove => {
                sqlx::query("DELETE FROM documents WHERE path = $1")
                    .bind(path)
                    .execute(&mut *tx)
                    .await?;
                TxOutcome::committed(None)
            }
        };

        tx.commit().await?;
        Ok(Some(outcome))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, DocumentError> {
        parent_of(path)?;
        let query = format!("SELECT {DOC_COLUMNS} FROM documents WHERE path = $1");
        Ok(sqlx::query_as::<_, Document>(&query)
            .bind(path)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set(&self, path: &str, body: Value) -> Result<Document, DocumentError> {
        let parent = parent_of(path)?;
        if !body.is_object() {
            return Err(DocumentError::NotAnObject(path.to_string()));
        }
        let query = format!(
            "INSERT INTO documents (path, parent, body) VALUES ($1, $2, $3) \
             ON CONFLICT (path) DO UPDATE \
             SET body = EXCLUDED.body, version = documents.version + 1, updated_at = NOW() \
             RETURNING {DOC_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Document>(&query)
            .bind(path)
            .bind(parent)
            .bind(&body)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update(
        &self,
        path: &str,
        partial: Map<String, Value>,
    ) -> Result<Document, DocumentError> {
        parent_of(path)?;
        let query = format!(
            "UPDATE documents SET body = body || $2, version = version + 1, updated_at = NOW() \
             WHERE path = $1 RETURNING {DOC_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(path)
            .bind(Value::Object(partial))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DocumentError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<bool, DocumentError> {
        parent_of(path)?;
        let result = sqlx::query("DELETE FROM documents WHERE path = $1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, parent: &str) -> Result<Vec<Document>, DocumentError> {
        let query = format!("SELECT {DOC_COLUMNS} FROM documents WHERE parent = $1 ORDER BY path");
        Ok(sqlx::query_as::<_, Document>(&query)
            .bind(parent)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn transaction(
        &self,
        path: &str,
        decide: DocumentDecide<'_>,
    ) -> Result<TxOutcome<Document>, DocumentError> {
        let parent = parent_of(path)?;
        for attempt in 1..=MAX_TX_ATTEMPTS {
            if let Some(outcome) = self.try_transaction(path, parent, decide).await? {
                return Ok(outcome);
            }
            tracing::debug!(path, attempt, "Document transaction contended, retrying");
        }
        Err(DocumentError::Transport(format!(
            "transaction on {path} did not settle after {MAX_TX_ATTEMPTS} attempts"
        )))
    }

    async fn health_check(&self) -> Result<(), DocumentError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
