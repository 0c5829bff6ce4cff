//! Certificates listed on the portfolio page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project::validate_assigned_id;
use super::{
    lenient_link, lenient_text, lenient_timestamp, or_placeholder, Draft, FieldValue, FormMode,
    KindSchema, PlannedWrite, Record, RecordKind, ValidationErrors, PLACEHOLDER,
};
use crate::store::{Direction, WriteData};

pub static SCHEMA: KindSchema = KindSchema {
    collection: "certificates",
    label: "Certificates",
    singular: "certificate",
    search_fields: &["title", "description", "issuer"],
    export_header: "ID,Title,Description,Img,Issuer,Date,Link",
    export_fields: &["id", "title", "description", "Img", "issuer", "date", "Link"],
    default_order: Some(("createdAt", Direction::Desc)),
    editable: true,
    has_category: false,
};

fn placeholder() -> String {
    PLACEHOLDER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub issuer: String,
    /// Free text as entered, e.g. "March 2024".
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(rename = "Img", default = "placeholder", deserialize_with = "lenient_link")]
    pub img: String,
    #[serde(rename = "Link", default = "placeholder", deserialize_with = "lenient_link")]
    pub link: String,
    #[serde(rename = "createdAt", default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Certificate {
    const KIND: RecordKind = RecordKind::Certificates;
    type Draft = CertificateDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, key: &str) -> FieldValue<'_> {
        match key {
            "id" => FieldValue::Text(&self.id),
            "title" => FieldValue::Text(&self.title),
            "description" => FieldValue::Text(&self.description),
            "issuer" => FieldValue::Text(&self.issuer),
            "date" => FieldValue::Text(&self.date),
            "Img" => FieldValue::Text(&self.img),
            "Link" => FieldValue::Text(&self.link),
            "createdAt" => FieldValue::Timestamp(self.created_at),
            "updatedAt" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Missing,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateDraft {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "Img", default)]
    pub img: String,
    #[serde(rename = "Link", default)]
    pub link: String,
}

impl Draft for CertificateDraft {
    type Record = Certificate;

    fn from_record(record: &Certificate) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            issuer: record.issuer.clone(),
            date: record.date.clone(),
            img: record.img.clone(),
            link: record.link.clone(),
        }
    }

    fn validate(&self, mode: &FormMode) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_assigned_id(&mut errors, &self.id, mode);
        errors.require("title", "Title", &self.title);
        errors.require("description", "Description", &self.description);
        errors.require("issuer", "Issuer", &self.issuer);
        errors.require("date", "Date", &self.date);
        errors.into_result()
    }

    fn plan(&self, _mode: &FormMode) -> PlannedWrite {
        let data = WriteData::new()
            .set("title", self.title.trim())
            .set("description", self.description.trim())
            .set("issuer", self.issuer.trim())
            .set("date", self.date.trim())
            .set("Img", or_placeholder(&self.img))
            .set("Link", or_placeholder(&self.link))
            .server_timestamp_on_create("createdAt")
            .server_timestamp("updatedAt");
        PlannedWrite::Upsert {
            id: self.id.trim().to_string(),
            data,
        }
    }

    fn to_record(&self, id: &str, previous: Option<&Certificate>) -> Certificate {
        Certificate {
            id: id.to_string(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            issuer: self.issuer.trim().to_string(),
            date: self.date.trim().to_string(),
            img: or_placeholder(&self.img),
            link: or_placeholder(&self.link),
            created_at: previous.and_then(|p| p.created_at),
            updated_at: previous.and_then(|p| p.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        let errors = CertificateDraft {
            id: "aws".to_string(),
            title: "AWS Cloud Practitioner".to_string(),
            ..Default::default()
        }
        .validate(&FormMode::Create)
        .unwrap_err();
        assert!(!errors.contains("id"));
        assert!(!errors.contains("title"));
        for field in ["description", "issuer", "date"] {
            assert!(errors.contains(field), "{field} should be required");
        }
    }

    #[test]
    fn test_slash_in_id_is_rejected() {
        let errors = CertificateDraft {
            id: "a/b".to_string(),
            ..Default::default()
        }
        .validate(&FormMode::Create)
        .unwrap_err();
        assert_eq!(errors.get("id"), Some("ID cannot contain '/'"));
    }

    #[test]
    fn test_to_record_keeps_previous_timestamps() {
        let previous = Certificate {
            id: "aws".to_string(),
            title: "old".to_string(),
            description: String::new(),
            issuer: String::new(),
            date: String::new(),
            img: PLACEHOLDER.to_string(),
            link: PLACEHOLDER.to_string(),
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        let draft = CertificateDraft {
            title: "new".to_string(),
            ..CertificateDraft::from_record(&previous)
        };
        let record = draft.to_record("aws", Some(&previous));
        assert_eq!(record.title, "new");
        assert_eq!(record.created_at, previous.created_at);
    }
}
