//! Live mirror of one collection.
//!
//! A [`CollectionSync`] owns at most one store subscription. Every snapshot
//! the store pushes replaces the whole in-memory list; local patches applied
//! after a successful write are hints that the next snapshot confirms or
//! overwrites.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{Record, RecordKind};
use crate::store::{Document, DocumentStore, ListenerGuard, OrderBy, Query};

/// What a view renders for one collection.
#[derive(Debug, Clone, Serialize)]
pub struct SyncState<R> {
    pub loading: bool,
    pub records: Vec<R>,
    pub error: Option<String>,
    /// Snapshots applied since the current subscription opened.
    #[serde(skip)]
    pub snapshots: u64,
}

impl<R> Default for SyncState<R> {
    fn default() -> Self {
        Self {
            loading: false,
            records: Vec::new(),
            error: None,
            snapshots: 0,
        }
    }
}

struct ActiveSubscription {
    query: Query,
    // Dropped before the pump is aborted so the store stops pushing first.
    guard: Option<ListenerGuard>,
    pump: JoinHandle<()>,
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.pump.abort();
    }
}

pub struct CollectionSync<R: Record> {
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<SyncState<R>>>,
    active: Mutex<Option<ActiveSubscription>>,
    epoch: Arc<AtomicU64>,
    _kind: PhantomData<fn() -> R>,
}

fn map_documents<R: Record>(documents: &[Document]) -> Vec<R> {
    documents
        .iter()
        .filter_map(|doc| match R::from_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    collection = R::KIND.as_str(),
                    id = %doc.id,
                    "Skipping malformed document: {}",
                    e
                );
                None
            }
        })
        .collect()
}

impl<R: Record> CollectionSync<R> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (tx, _rx) = watch::channel(SyncState::default());
        Self {
            store,
            state: Arc::new(tx),
            active: Mutex::new(None),
            epoch: Arc::new(AtomicU64::new(0)),
            _kind: PhantomData,
        }
    }

    pub fn kind(&self) -> RecordKind {
        R::KIND
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveSubscription>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes with the kind's default ordering.
    pub async fn subscribe_default(&self) {
        let query = R::KIND.schema().default_query();
        self.subscribe(query.order_by).await;
    }

    /// Opens a live query on this kind's collection, cancelling any previous
    /// one first. Store failures end up in [`SyncState::error`].
    pub async fn subscribe(&self, order_by: Option<OrderBy>) {
        self.unsubscribe();

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let query = Query {
            collection: R::KIND.as_str().to_string(),
            order_by,
        };
        self.state.send_modify(|s| {
            s.loading = true;
            s.records.clear();
            s.error = None;
            s.snapshots = 0;
        });

        let subscription = match self.store.subscribe(&query).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(collection = %query.collection, "Subscription failed: {}", e);
                if self.epoch.load(Ordering::SeqCst) == epoch {
                    self.state.send_modify(|s| {
                        s.loading = false;
                        s.error = Some(e.to_string());
                    });
                }
                return;
            }
        };

        let (mut events, guard) = subscription.into_parts();
        let state = self.state.clone();
        let current = self.epoch.clone();
        let collection = query.collection.clone();

        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                // The epoch is checked under the state lock so a snapshot
                // from a cancelled subscription never lands after a reset.
                let applied = match event {
                    Ok(documents) => {
                        let records = map_documents::<R>(&documents);
                        debug!(
                            collection = %collection,
                            count = records.len(),
                            "Snapshot received"
                        );
                        state.send_if_modified(|s| {
                            if current.load(Ordering::SeqCst) != epoch {
                                return false;
                            }
                            s.records = records;
                            s.loading = false;
                            s.error = None;
                            s.snapshots += 1;
                            true
                        })
                    }
                    Err(e) => {
                        warn!(collection = %collection, "Subscription error: {}", e);
                        state.send_if_modified(|s| {
                            if current.load(Ordering::SeqCst) != epoch {
                                return false;
                            }
                            s.loading = false;
                            s.error = Some(e.to_string());
                            true
                        });
                        break;
                    }
                };
                if !applied {
                    break;
                }
            }
        });

        let mut active = self.active();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            // A newer subscribe or an unsubscribe ran while this one was opening.
            drop(guard);
            pump.abort();
            return;
        }
        *active = Some(ActiveSubscription {
            query,
            guard: Some(guard),
            pump,
        });
        info!(collection = R::KIND.as_str(), "Subscribed");
    }

    /// Cancels the live query, if any. Returns whether one was active.
    pub fn unsubscribe(&self) -> bool {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let previous = self.active().take();
        let was_active = previous.is_some();
        drop(previous);
        if was_active {
            self.state.send_modify(|s| s.loading = false);
            info!(collection = R::KIND.as_str(), "Unsubscribed");
        }
        was_active
    }

    pub fn is_subscribed(&self) -> bool {
        self.active().is_some()
    }

    pub fn current_query(&self) -> Option<Query> {
        self.active().as_ref().map(|a| a.query.clone())
    }

    pub fn state(&self) -> SyncState<R> {
        self.state.borrow().clone()
    }

    pub fn records(&self) -> Vec<R> {
        self.state.borrow().records.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn find(&self, id: &str) -> Option<R> {
        self.state
            .borrow()
            .records
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    pub fn watch(&self) -> watch::Receiver<SyncState<R>> {
        self.state.subscribe()
    }

    /// Local patch after a successful write: replaces the record with the
    /// same id or appends it.
    pub fn apply_local(&self, record: R) {
        self.state.send_modify(|s| {
            match s.records.iter_mut().find(|r| r.id() == record.id()) {
                Some(existing) => *existing = record,
                None => s.records.push(record),
            }
        });
    }

    pub fn remove_local(&self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        self.state
            .send_modify(|s| s.records.retain(|r| !ids.iter().any(|id| id == r.id())));
    }

    pub fn modify_local(&self, id: &str, f: impl FnOnce(&mut R)) -> bool {
        let mut found = false;
        self.state.send_modify(|s| {
            if let Some(record) = s.records.iter_mut().find(|r| r.id() == id) {
                f(record);
                found = true;
            }
        });
        found
    }

    /// Waits until `pred` holds for the current state. Returns false on
    /// timeout.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        mut pred: impl FnMut(&SyncState<R>) -> bool,
    ) -> bool {
        let mut rx = self.state.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(|s| pred(s))).await;
        matches!(result, Ok(Ok(_)))
    }

    /// Waits until the first snapshot or an error arrives.
    pub async fn wait_for_load(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| !s.loading).await
    }
}

impl<R: Record> Drop for CollectionSync<R> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
