//! Messages sent through the public contact form. Append-only: the dashboard
//! lists, exports and deletes them but never edits them.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
    lenient_text, lenient_timestamp, Draft, FieldValue, FormMode, KindSchema, PlannedWrite, Record,
    RecordKind, ValidationErrors,
};
use crate::store::WriteData;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^\S+@\S+\.\S+$").unwrap();
}

pub static SCHEMA: KindSchema = KindSchema {
    collection: "contacts",
    label: "Contacts",
    singular: "contact",
    search_fields: &["name", "email", "message"],
    export_header: "Name,Email,Message,Date",
    export_fields: &["name", "email", "message", "createdAt"],
    default_order: None,
    editable: false,
    has_category: false,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Contact {
    const KIND: RecordKind = RecordKind::Contacts;
    type Draft = ContactDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, key: &str) -> FieldValue<'_> {
        match key {
            "id" => FieldValue::Text(&self.id),
            "name" => FieldValue::Text(&self.name),
            "email" => FieldValue::Text(&self.email),
            "message" => FieldValue::Text(&self.message),
            "createdAt" => FieldValue::Timestamp(self.created_at),
            _ => FieldValue::Missing,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl Draft for ContactDraft {
    type Record = Contact;

    fn from_record(record: &Contact) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            message: record.message.clone(),
        }
    }

    fn validate(&self, _mode: &FormMode) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("name", "Name", &self.name);
        errors.require("email", "Email", &self.email);
        if !self.email.trim().is_empty() && !EMAIL_RE.is_match(self.email.trim()) {
            errors.add("email", "Email is invalid");
        }
        errors.require("message", "Message", &self.message);
        errors.into_result()
    }

    fn plan(&self, mode: &FormMode) -> PlannedWrite {
        let data = WriteData::new()
            .set("name", self.name.trim())
            .set("email", self.email.trim())
            .set("message", self.message.trim());
        match mode {
            FormMode::Create => PlannedWrite::Create(data.server_timestamp("createdAt")),
            FormMode::Edit { id } => PlannedWrite::Update {
                id: id.clone(),
                data,
            },
        }
    }

    fn to_record(&self, id: &str, previous: Option<&Contact>) -> Contact {
        Contact {
            id: id.to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            message: self.message.trim().to_string(),
            created_at: previous.and_then(|p| p.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, email: &str, message: &str) -> ContactDraft {
        ContactDraft {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_valid_contact_passes() {
        assert!(draft("Ann", "ann@example.com", "Hello")
            .validate(&FormMode::Create)
            .is_ok());
    }

    #[test]
    fn test_email_shape_is_checked() {
        let errors = draft("Ann", "ann@example", "Hello")
            .validate(&FormMode::Create)
            .unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is invalid"));
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let errors = draft("", "", "  ").validate(&FormMode::Create).unwrap_err();
        assert!(errors.contains("name"));
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert!(errors.contains("message"));
    }

    #[test]
    fn test_create_stamps_created_at() {
        let PlannedWrite::Create(data) = draft("Ann", "a@b.co", "hi").plan(&FormMode::Create) else {
            panic!("expected a create");
        };
        assert_eq!(data.transforms.len(), 1);
        assert_eq!(data.transforms[0].0, "createdAt");
    }
}
