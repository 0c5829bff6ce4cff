//! Record kinds managed by the dashboard.
//!
//! Each kind is described by a declarative [`KindSchema`] (collection name,
//! searchable fields, export columns, default ordering, editability) and a
//! pair of types: the [`Record`] as stored and streamed, and its [`Draft`]
//! as edited in a form.

pub mod certificate;
pub mod comment;
pub mod contact;
pub mod project;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::store::{CollectionRef, Direction, Document, Query, WriteData};

pub use certificate::{Certificate, CertificateDraft};
pub use comment::{Comment, CommentDraft, DEFAULT_PROFILE_EMOJI, PROFILE_EMOJIS};
pub use contact::{Contact, ContactDraft};
pub use project::{Project, ProjectDraft, PROJECT_CATEGORIES};

/// Stored in optional text fields that were left empty.
pub const PLACEHOLDER: &str = "----";

/// Category filter value that matches every record.
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Contacts,
    Comments,
    Projects,
    Certificates,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Contacts,
        RecordKind::Comments,
        RecordKind::Projects,
        RecordKind::Certificates,
    ];

    pub fn schema(self) -> &'static KindSchema {
        match self {
            RecordKind::Contacts => &contact::SCHEMA,
            RecordKind::Comments => &comment::SCHEMA,
            RecordKind::Projects => &project::SCHEMA,
            RecordKind::Certificates => &certificate::SCHEMA,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.schema().collection
    }

    pub fn collection(self) -> CollectionRef {
        CollectionRef::new(self.schema().collection)
    }

    pub fn label(self) -> &'static str {
        self.schema().label
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown record kind: {s}"))
    }
}

/// Per-kind configuration shared by the sync, projection, form and export
/// layers.
#[derive(Debug)]
pub struct KindSchema {
    pub collection: &'static str,
    pub label: &'static str,
    pub singular: &'static str,
    /// Fields matched by the free-text search.
    pub search_fields: &'static [&'static str],
    pub export_header: &'static str,
    /// Record fields emitted per export row, in header order.
    pub export_fields: &'static [&'static str],
    pub default_order: Option<(&'static str, Direction)>,
    /// Whether the admin dashboard may create or edit records of this kind.
    pub editable: bool,
    pub has_category: bool,
}

impl KindSchema {
    pub fn default_query(&self) -> Query {
        let collection = CollectionRef::new(self.collection);
        match self.default_order {
            Some((field, direction)) => collection.order_by(field, direction),
            None => collection.query(),
        }
    }
}

/// A record field as seen by the projector and the exporter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    List(&'a [String]),
    Flag(bool),
    Timestamp(Option<DateTime<Utc>>),
    Missing,
}

impl FieldValue<'_> {
    /// Text used for search matching and non-timestamp sorting.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => (*s).to_string(),
            FieldValue::List(items) => join_list(items),
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Timestamp(Some(at)) => at.to_rfc3339(),
            FieldValue::Timestamp(None) | FieldValue::Missing => String::new(),
        }
    }
}

/// A stored record of one kind.
pub trait Record:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: RecordKind;

    type Draft: Draft<Record = Self>;

    fn id(&self) -> &str;

    fn field(&self, key: &str) -> FieldValue<'_>;

    fn category(&self) -> Option<&str> {
        None
    }

    /// Maps a store document to a record. The store id always wins over an
    /// `id` field held inside the body.
    fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let mut fields = doc.fields.clone();
        fields.insert("id".to_string(), Value::String(doc.id.clone()));
        serde_json::from_value(Value::Object(fields))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FormMode {
    Create,
    Edit { id: String },
}

impl FormMode {
    pub fn is_edit(&self) -> bool {
        matches!(self, FormMode::Edit { .. })
    }
}

/// The store write a validated draft turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedWrite {
    /// Store-generated id.
    Create(WriteData),
    /// Administrator-assigned id, create or replace.
    Upsert { id: String, data: WriteData },
    /// Merge into an existing document.
    Update { id: String, data: WriteData },
}

/// Form-side representation of a record.
pub trait Draft:
    Clone + Default + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    type Record;

    fn from_record(record: &Self::Record) -> Self;

    fn validate(&self, mode: &FormMode) -> Result<(), ValidationErrors>;

    /// Store write for a draft that passed validation.
    fn plan(&self, mode: &FormMode) -> PlannedWrite;

    /// Local copy of the record after a successful write under `id`.
    fn to_record(&self, id: &str, previous: Option<&Self::Record>) -> Self::Record;
}

/// Field name to message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Records `"{label} is required"` when `value` is blank.
    pub fn require(&mut self, field: &str, label: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, format!("{label} is required"));
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.values().map(String::as_str).collect();
        f.write_str(&messages.join("; "))
    }
}

/// Splits a comma-separated text field into trimmed, non-empty items.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_list(items: &[String]) -> String {
    items.join(", ")
}

/// Trimmed value, or [`PLACEHOLDER`] when blank.
pub fn or_placeholder(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Accepts either a JSON array or a comma-separated string. Any other scalar
/// becomes a single item; null becomes an empty list.
pub(crate) fn list_or_text<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(text) => split_list(&text),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    })
}

/// Draft-side counterpart of [`list_or_text`]: joins arrays for editing.
pub(crate) fn text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    list_or_text(deserializer).map(|items| join_list(&items))
}

/// Accepts any scalar and renders it as text; null becomes empty.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Optional link or image field: a non-empty string, otherwise [`PLACEHOLDER`].
pub(crate) fn lenient_link<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => s,
        _ => PLACEHOLDER.to_string(),
    })
}

/// Only a JSON `true` counts as set.
pub(crate) fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

/// Accepts an RFC 3339 string and treats anything else as absent.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(crate::store::parse_timestamp(&Value::deserialize(deserializer)?))
}
