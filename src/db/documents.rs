//! Postgres-backed document store.
//!
//! Every collection lives in the single `documents` table as JSONB bodies.
//! Writes run in a transaction that ends with `pg_notify` on
//! [`CHANGES_CHANNEL`](super::CHANGES_CHANNEL) carrying the collection name;
//! live queries hold a `LISTEN` connection and re-read the collection on each
//! matching notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tokio::sync::mpsc;

use super::CHANGES_CHANNEL;
use crate::store::{
    generate_document_id, sort_documents, CollectionRef, Document, DocumentRef, DocumentStore,
    Fields, ListenerGuard, Query, StoreError, StoreResult, Subscription, WriteData,
};

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    data: Value,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        match row.data {
            Value::Object(fields) => Ok(Document::new(row.id, fields)),
            other => Err(StoreError::Serialization(format!(
                "Document {} is not an object: {}",
                row.id, other
            ))),
        }
    }
}

/// A notification for this collection, or a reconnect (`None`) after which
/// notifications sent while the connection was down are gone.
fn needs_refresh(payload: Option<&str>, collection: &str) -> bool {
    match payload {
        Some(p) => p == collection,
        None => true,
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: Arc<PgPool>,
}

impl PgDocumentStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn lock_existing(
        tx: &mut Transaction<'_, Postgres>,
        doc: &DocumentRef,
    ) -> StoreResult<Option<Fields>> {
        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(&doc.collection)
        .bind(&doc.id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.and_then(|(data,)| match data {
            Value::Object(fields) => Some(fields),
            _ => None,
        }))
    }

    async fn write_body(
        tx: &mut Transaction<'_, Postgres>,
        doc: &DocumentRef,
        fields: Fields,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = now()
            "#,
        )
        .bind(&doc.collection)
        .bind(&doc.id)
        .bind(Value::Object(fields))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn notify(tx: &mut Transaction<'_, Postgres>, collection: &str) -> StoreResult<()> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANGES_CHANNEL)
            .bind(collection)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

async fn fetch_collection(pool: &PgPool, query: &Query) -> StoreResult<Vec<Document>> {
    let rows: Vec<DocumentRow> =
        sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 ORDER BY id")
            .bind(&query.collection)
            .fetch_all(pool)
            .await?;

    let mut documents = rows
        .into_iter()
        .map(Document::try_from)
        .collect::<StoreResult<Vec<_>>>()?;
    sort_documents(&mut documents, query.order_by.as_ref());
    Ok(documents)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(&self, collection: &CollectionRef, data: WriteData) -> StoreResult<String> {
        let fields = data.resolve(None, Utc::now(), false);
        let body = Value::Object(fields);
        let mut tx = self.pool.begin().await?;

        let id = loop {
            let id = generate_document_id();
            let inserted = sqlx::query(
                r#"
                INSERT INTO documents (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id) DO NOTHING
                "#,
            )
            .bind(collection.name())
            .bind(&id)
            .bind(&body)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() == 1 {
                break id;
            }
        };

        Self::notify(&mut tx, collection.name()).await?;
        tx.commit().await?;
        tracing::debug!(collection = collection.name(), id = %id, "Document created");
        Ok(id)
    }

    async fn upsert(&self, doc: &DocumentRef, data: WriteData) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let existing = Self::lock_existing(&mut tx, doc).await?;
        let fields = data.resolve(existing.as_ref(), Utc::now(), false);
        Self::write_body(&mut tx, doc, fields).await?;
        Self::notify(&mut tx, &doc.collection).await?;
        tx.commit().await?;
        tracing::debug!(doc = %doc, "Document upserted");
        Ok(())
    }

    async fn update_fields(&self, doc: &DocumentRef, data: WriteData) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let existing = Self::lock_existing(&mut tx, doc)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("No document to update: {doc}")))?;
        let fields = data.resolve(Some(&existing), Utc::now(), true);
        Self::write_body(&mut tx, doc, fields).await?;
        Self::notify(&mut tx, &doc.collection).await?;
        tx.commit().await?;
        tracing::debug!(doc = %doc, "Document fields updated");
        Ok(())
    }

    async fn delete(&self, doc: &DocumentRef) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(&doc.collection)
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("No document to delete: {doc}")));
        }
        Self::notify(&mut tx, &doc.collection).await?;
        tx.commit().await?;
        tracing::debug!(doc = %doc, "Document deleted");
        Ok(())
    }

    async fn fetch(&self, query: &Query) -> StoreResult<Vec<Document>> {
        fetch_collection(&self.pool, query).await
    }

    async fn subscribe(&self, query: &Query) -> StoreResult<Subscription> {
        // Listen before the first read so no change between the two is lost.
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGES_CHANNEL).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pool = self.pool.clone();
        let query = query.clone();

        let task = tokio::spawn(async move {
            let initial = fetch_collection(&pool, &query).await;
            let failed = initial.is_err();
            if tx.send(initial).is_err() || failed {
                return;
            }

            loop {
                let notification = match listener.try_recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(collection = %query.collection, "Change listener failed: {}", e);
                        let _ = tx.send(Err(StoreError::from(e)));
                        return;
                    }
                };
                let payload = notification.as_ref().map(|n| n.payload());
                if payload.is_none() {
                    tracing::info!(
                        collection = %query.collection,
                        "Change listener reconnected, re-reading collection"
                    );
                }
                if !needs_refresh(payload, &query.collection) {
                    continue;
                }

                let snapshot = fetch_collection(&pool, &query).await;
                let failed = snapshot.is_err();
                if tx.send(snapshot).is_err() || failed {
                    return;
                }
            }
        });

        let abort = task.abort_handle();
        Ok(Subscription::new(rx, ListenerGuard::new(move || abort.abort())))
    }

    async fn health_check(&self) -> StoreResult<Duration> {
        Ok(super::ping(&self.pool).await?)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
