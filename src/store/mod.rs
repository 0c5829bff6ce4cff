//! Remote document store capability.
//!
//! Collections of JSON documents keyed by string ids, with create / upsert /
//! field update / delete and live queries that push the full ordered snapshot
//! of a collection after every change.
//!
//! Implementations:
//! - [`memory::InMemoryStore`] - process-local store used by tests and the
//!   no-database mode
//! - [`crate::db::documents::PgDocumentStore`] - Postgres JSONB table driven by
//!   `LISTEN/NOTIFY`

pub mod memory;

use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

pub use crate::error::{StoreError, StoreResult};

/// Length of store-generated document ids.
pub const GENERATED_ID_LEN: usize = 20;

pub type Fields = Map<String, Value>;

/// Reference to a named collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef(String);

impl CollectionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentRef {
        DocumentRef {
            collection: self.0.clone(),
            id: id.into(),
        }
    }

    pub fn query(&self) -> Query {
        Query {
            collection: self.0.clone(),
            order_by: None,
        }
    }

    pub fn order_by(&self, field: impl Into<String>, direction: Direction) -> Query {
        Query {
            collection: self.0.clone(),
            order_by: Some(OrderBy {
                field: field.into(),
                direction,
            }),
        }
    }
}

/// Reference to one document of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }

    /// Applies this direction to an ascending comparison result.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A live or one-shot query over a single collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub collection: String,
    pub order_by: Option<OrderBy>,
}

/// A stored document: its key plus its field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTransform {
    /// Stamp the field with the store clock on every write.
    ServerTimestamp,
    /// Stamp the field only if the stored document does not hold it yet.
    ServerTimestampOnCreate,
}

/// Field values for a write, plus server-side timestamp transforms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteData {
    pub fields: Fields,
    pub transforms: Vec<(String, FieldTransform)>,
}

impl WriteData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self {
            fields,
            transforms: Vec::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.transforms
            .push((field.into(), FieldTransform::ServerTimestamp));
        self
    }

    pub fn server_timestamp_on_create(mut self, field: impl Into<String>) -> Self {
        self.transforms
            .push((field.into(), FieldTransform::ServerTimestampOnCreate));
        self
    }

    /// Produces the stored field map.
    ///
    /// `merge` keeps every existing field not named by this write (field
    /// update); otherwise the write replaces the document body.
    pub fn resolve(self, existing: Option<&Fields>, now: DateTime<Utc>, merge: bool) -> Fields {
        let mut out = match (merge, existing) {
            (true, Some(existing)) => existing.clone(),
            _ => Fields::new(),
        };
        for (key, value) in self.fields {
            out.insert(key, value);
        }
        for (key, transform) in self.transforms {
            let stamped = match transform {
                FieldTransform::ServerTimestamp => timestamp_value(now),
                FieldTransform::ServerTimestampOnCreate => existing
                    .and_then(|fields| fields.get(&key))
                    .filter(|value| !value.is_null())
                    .cloned()
                    .unwrap_or_else(|| timestamp_value(now)),
            };
            out.insert(key, stamped);
        }
        out
    }
}

/// Encodes a timestamp the way the stores persist it. Fixed precision and a
/// `Z` suffix keep lexical order equal to chronological order.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn generate_document_id() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), GENERATED_ID_LEN)
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Ascending comparison of two field values. Missing and null values sort
/// lowest.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x @ (Value::Array(_) | Value::Object(_))), Some(y))
            if type_rank(Some(x)) == type_rank(Some(y)) =>
        {
            x.to_string().cmp(&y.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Orders a snapshot the way every store implementation must: by the query's
/// field when given, ties and unordered queries by document id.
pub fn sort_documents(documents: &mut [Document], order_by: Option<&OrderBy>) {
    documents.sort_by(|a, b| {
        let primary = match order_by {
            Some(order) => order
                .direction
                .apply(compare_values(a.get(&order.field), b.get(&order.field))),
            None => Ordering::Equal,
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}

/// One delivery from a live query.
pub type SnapshotEvent = StoreResult<Vec<Document>>;

/// Unregisters a live listener when dropped.
pub struct ListenerGuard {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerGuard {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn noop() -> Self {
        Self { cancel: None }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Handle to a live query. Events arrive in the order the store emits them;
/// an `Err` event is the last one.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    guard: ListenerGuard,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<SnapshotEvent>, guard: ListenerGuard) -> Self {
        Self { events, guard }
    }

    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self.guard);
    }

    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<SnapshotEvent>, ListenerGuard) {
        (self.events, self.guard)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Adds a document under a store-generated id and returns that id.
    async fn create(&self, collection: &CollectionRef, data: WriteData) -> StoreResult<String>;

    /// Creates the document if absent, replaces its body otherwise.
    async fn upsert(&self, doc: &DocumentRef, data: WriteData) -> StoreResult<()>;

    /// Merges fields into an existing document.
    async fn update_fields(&self, doc: &DocumentRef, data: WriteData) -> StoreResult<()>;

    async fn delete(&self, doc: &DocumentRef) -> StoreResult<()>;

    async fn fetch(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Opens a live query. The first event is the current snapshot.
    async fn subscribe(&self, query: &Query) -> StoreResult<Subscription>;

    async fn health_check(&self) -> StoreResult<Duration>;

    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_resolve_replace_drops_unnamed_fields() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let existing = fields(json!({ "Title": "old", "stale": true }));
        let out = WriteData::new()
            .set("Title", "new")
            .resolve(Some(&existing), now, false);
        assert_eq!(out.get("Title"), Some(&json!("new")));
        assert!(!out.contains_key("stale"));
    }

    #[test]
    fn test_resolve_merge_keeps_other_fields() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let existing = fields(json!({ "name": "Ann", "isPinned": true }));
        let out = WriteData::new()
            .set("isPinned", false)
            .resolve(Some(&existing), now, true);
        assert_eq!(out.get("name"), Some(&json!("Ann")));
        assert_eq!(out.get("isPinned"), Some(&json!(false)));
    }

    #[test]
    fn test_timestamp_on_create_is_set_once() {
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let data = || {
            WriteData::new()
                .server_timestamp_on_create("createdAt")
                .server_timestamp("updatedAt")
        };

        let created = data().resolve(None, first, false);
        let replaced = data().resolve(Some(&created), later, false);

        assert_eq!(replaced.get("createdAt"), Some(&timestamp_value(first)));
        assert_eq!(replaced.get("updatedAt"), Some(&timestamp_value(later)));
        assert_eq!(parse_timestamp(&replaced["createdAt"]), Some(first));
    }

    #[test]
    fn test_sort_documents_missing_field_is_lowest() {
        let mut docs = vec![
            Document::new("b", fields(json!({ "createdAt": "2025-01-02T00:00:00.000000Z" }))),
            Document::new("a", Fields::new()),
            Document::new("c", fields(json!({ "createdAt": "2025-01-03T00:00:00.000000Z" }))),
        ];
        let order = OrderBy {
            field: "createdAt".to_string(),
            direction: Direction::Desc,
        };
        sort_documents(&mut docs, Some(&order));
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);

        sort_documents(&mut docs, None);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_generated_ids_are_alphanumeric() {
        let id = generate_document_id();
        assert_eq!(id.len(), GENERATED_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
