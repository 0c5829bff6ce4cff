//! Process-local document store.
//!
//! Keeps every collection in memory and pushes a fresh snapshot to each
//! matching listener synchronously inside the write, so a write is visible to
//! listeners before the write future resolves. Access rules can be tightened
//! per collection or per document to reproduce permission failures.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    generate_document_id, sort_documents, CollectionRef, Document, DocumentRef, DocumentStore,
    Fields, ListenerGuard, Query, SnapshotEvent, StoreError, StoreResult, Subscription, WriteData,
};

pub const PERMISSION_DENIED: &str = "Missing or insufficient permissions.";

struct Listener {
    query: Query,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    denied_collections: HashMap<String, String>,
    denied_documents: HashMap<(String, String), String>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Inner {
    /// Store clock. Strictly increasing so server timestamps never tie.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now
    }

    fn check_collection(&self, collection: &str) -> StoreResult<()> {
        match self.denied_collections.get(collection) {
            Some(reason) => Err(StoreError::PermissionDenied(reason.clone())),
            None => Ok(()),
        }
    }

    fn check_document(&self, doc: &DocumentRef) -> StoreResult<()> {
        self.check_collection(&doc.collection)?;
        match self
            .denied_documents
            .get(&(doc.collection.clone(), doc.id.clone()))
        {
            Some(reason) => Err(StoreError::PermissionDenied(reason.clone())),
            None => Ok(()),
        }
    }

    fn snapshot(&self, query: &Query) -> Vec<Document> {
        let mut documents: Vec<Document> = self
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();
        sort_documents(&mut documents, query.order_by.as_ref());
        documents
    }

    /// Pushes the current snapshot to every listener on `collection`,
    /// dropping listeners whose receiver is gone.
    fn notify(&mut self, collection: &str) {
        let ids: Vec<u64> = self
            .listeners
            .iter()
            .filter(|(_, l)| l.query.collection == collection)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let Some(listener) = self.listeners.get(&id) else {
                continue;
            };
            let snapshot = self.snapshot(&listener.query);
            if listener.tx.send(Ok(snapshot)).is_err() {
                self.listeners.remove(&id);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects every read and write on `collection` with a permission error
    /// carrying `reason`.
    pub fn deny_collection(&self, collection: &str, reason: &str) {
        self.lock()
            .denied_collections
            .insert(collection.to_string(), reason.to_string());
    }

    pub fn allow_collection(&self, collection: &str) {
        self.lock().denied_collections.remove(collection);
    }

    /// Rejects writes and deletes on a single document.
    pub fn deny_document(&self, collection: &str, id: &str, reason: &str) {
        self.lock()
            .denied_documents
            .insert((collection.to_string(), id.to_string()), reason.to_string());
    }

    pub fn allow_document(&self, collection: &str, id: &str) {
        self.lock()
            .denied_documents
            .remove(&(collection.to_string(), id.to_string()));
    }

    /// Delivers `message` as a terminal error to every listener on
    /// `collection` and detaches them.
    pub fn fail_listeners(&self, collection: &str, message: &str) {
        let mut inner = self.lock();
        inner.listeners.retain(|_, listener| {
            if listener.query.collection != collection {
                return true;
            }
            let _ = listener
                .tx
                .send(Err(StoreError::Unavailable(message.to_string())));
            false
        });
    }

    pub fn listener_count(&self, collection: &str) -> usize {
        self.lock()
            .listeners
            .values()
            .filter(|l| l.query.collection == collection && !l.tx.is_closed())
            .count()
    }

    /// Writes a raw document, bypassing access rules, and notifies listeners.
    pub fn insert_raw(&self, collection: &str, id: &str, fields: Fields) {
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        inner.notify(collection);
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Fields> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock().snapshot(&CollectionRef::new(collection).query())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create(&self, collection: &CollectionRef, data: WriteData) -> StoreResult<String> {
        let mut inner = self.lock();
        inner.check_collection(collection.name())?;
        let now = inner.now();
        let docs = inner
            .collections
            .entry(collection.name().to_string())
            .or_default();
        let mut id = generate_document_id();
        while docs.contains_key(&id) {
            id = generate_document_id();
        }
        docs.insert(id.clone(), data.resolve(None, now, false));
        inner.notify(collection.name());
        debug!(collection = collection.name(), id = %id, "Document created");
        Ok(id)
    }

    async fn upsert(&self, doc: &DocumentRef, data: WriteData) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.check_document(doc)?;
        let now = inner.now();
        let docs = inner.collections.entry(doc.collection.clone()).or_default();
        let resolved = data.resolve(docs.get(&doc.id), now, false);
        docs.insert(doc.id.clone(), resolved);
        inner.notify(&doc.collection);
        debug!(doc = %doc, "Document upserted");
        Ok(())
    }

    async fn update_fields(&self, doc: &DocumentRef, data: WriteData) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.check_document(doc)?;
        let now = inner.now();
        let existing = inner
            .collections
            .get_mut(&doc.collection)
            .and_then(|docs| docs.get_mut(&doc.id))
            .ok_or_else(|| StoreError::NotFound(format!("No document to update: {doc}")))?;
        *existing = data.resolve(Some(&*existing), now, true);
        inner.notify(&doc.collection);
        debug!(doc = %doc, "Document fields updated");
        Ok(())
    }

    async fn delete(&self, doc: &DocumentRef) -> StoreResult<()> {
        let mut inner = self.lock();
        inner.check_document(doc)?;
        let removed = inner
            .collections
            .get_mut(&doc.collection)
            .and_then(|docs| docs.remove(&doc.id));
        if removed.is_none() {
            return Err(StoreError::NotFound(format!("No document to delete: {doc}")));
        }
        inner.notify(&doc.collection);
        debug!(doc = %doc, "Document deleted");
        Ok(())
    }

    async fn fetch(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let inner = self.lock();
        inner.check_collection(&query.collection)?;
        Ok(inner.snapshot(query))
    }

    async fn subscribe(&self, query: &Query) -> StoreResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        if let Err(e) = inner.check_collection(&query.collection) {
            let _ = tx.send(Err(e));
            return Ok(Subscription::new(rx, ListenerGuard::noop()));
        }

        let _ = tx.send(Ok(inner.snapshot(query)));
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(
            id,
            Listener {
                query: query.clone(),
                tx,
            },
        );
        debug!(collection = %query.collection, listener = id, "Listener attached");

        let weak = Arc::downgrade(&self.inner);
        let guard = ListenerGuard::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.listeners.remove(&id);
            }
        });
        Ok(Subscription::new(rx, guard))
    }

    async fn health_check(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        drop(self.lock());
        Ok(start.elapsed())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
