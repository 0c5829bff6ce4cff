//! Guestbook comments shown on the public site. Visitors and the
//! administrator can create them; at most one is pinned at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{
    lenient_flag, lenient_text, lenient_timestamp, Draft, FieldValue, FormMode, KindSchema,
    PlannedWrite, Record, RecordKind, ValidationErrors,
};
use crate::store::{Direction, WriteData};

pub const DEFAULT_PROFILE_EMOJI: &str = "😊";

pub const PROFILE_EMOJIS: [&str; 41] = [
    "😀", "😊", "😂", "😍", "😎", "😢", "😡", "🥳", "🤓", "🤗", "🐱", "🐶", "🦁", "🐘", "🐼",
    "🐸", "🐵", "🦄", "🐝", "🌟", "🚀", "🎉", "💡", "🌈", "🍎", "🍕", "☕", "🎸", "⚽", "🏀",
    "🎮", "📚", "💻", "🔥", "🍀", "🌍", "🎥", "✈️", "🕒", "☀️", "🌙",
];

pub static SCHEMA: KindSchema = KindSchema {
    collection: "comments",
    label: "Comments",
    singular: "comment",
    search_fields: &["name", "message"],
    export_header: "Name,Message,Date",
    export_fields: &["name", "message", "createdAt"],
    default_order: Some(("createdAt", Direction::Desc)),
    editable: true,
    has_category: false,
};

fn default_emoji() -> String {
    DEFAULT_PROFILE_EMOJI.to_string()
}

fn lenient_emoji<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => s,
        _ => default_emoji(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
    #[serde(default = "default_emoji", deserialize_with = "lenient_emoji")]
    pub profile_emoji: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_pinned: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Comment {
    const KIND: RecordKind = RecordKind::Comments;
    type Draft = CommentDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, key: &str) -> FieldValue<'_> {
        match key {
            "id" => FieldValue::Text(&self.id),
            "name" => FieldValue::Text(&self.name),
            "message" => FieldValue::Text(&self.message),
            "profileEmoji" => FieldValue::Text(&self.profile_emoji),
            "isPinned" => FieldValue::Flag(self.is_pinned),
            "createdAt" => FieldValue::Timestamp(self.created_at),
            _ => FieldValue::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_emoji")]
    pub profile_emoji: String,
}

impl Default for CommentDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            message: String::new(),
            profile_emoji: default_emoji(),
        }
    }
}

impl CommentDraft {
    fn emoji(&self) -> &str {
        match self.profile_emoji.trim() {
            "" => DEFAULT_PROFILE_EMOJI,
            emoji => emoji,
        }
    }
}

impl Draft for CommentDraft {
    type Record = Comment;

    fn from_record(record: &Comment) -> Self {
        Self {
            name: record.name.clone(),
            message: record.message.clone(),
            profile_emoji: record.profile_emoji.clone(),
        }
    }

    fn validate(&self, _mode: &FormMode) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("name", "Name", &self.name);
        errors.require("message", "Message", &self.message);
        if !PROFILE_EMOJIS.contains(&self.emoji()) {
            errors.add("profileEmoji", "Choose one of the available profile emojis");
        }
        errors.into_result()
    }

    fn plan(&self, mode: &FormMode) -> PlannedWrite {
        let data = WriteData::new()
            .set("name", self.name.trim())
            .set("message", self.message.trim());
        match mode {
            FormMode::Create => PlannedWrite::Create(
                data.set("profileEmoji", self.emoji())
                    .set("isPinned", false)
                    .server_timestamp("createdAt"),
            ),
            FormMode::Edit { id } => PlannedWrite::Update {
                id: id.clone(),
                data,
            },
        }
    }

    fn to_record(&self, id: &str, previous: Option<&Comment>) -> Comment {
        Comment {
            id: id.to_string(),
            name: self.name.trim().to_string(),
            message: self.message.trim().to_string(),
            profile_emoji: previous
                .map(|p| p.profile_emoji.clone())
                .unwrap_or_else(|| self.emoji().to_string()),
            is_pinned: previous.is_some_and(|p| p.is_pinned),
            created_at: previous.and_then(|p| p.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;
    use serde_json::json;

    #[test]
    fn test_missing_emoji_defaults() {
        let doc = Document::new(
            "c1",
            json!({ "name": "Ann", "message": "hi" })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let comment = Comment::from_document(&doc).unwrap();
        assert_eq!(comment.profile_emoji, DEFAULT_PROFILE_EMOJI);
        assert!(!comment.is_pinned);
        assert!(comment.created_at.is_none());
    }

    #[test]
    fn test_unknown_emoji_is_rejected() {
        let draft = CommentDraft {
            name: "Ann".to_string(),
            message: "hi".to_string(),
            profile_emoji: "🦀".to_string(),
        };
        let errors = draft.validate(&FormMode::Create).unwrap_err();
        assert!(errors.contains("profileEmoji"));
    }

    #[test]
    fn test_create_writes_unpinned_comment() {
        let draft = CommentDraft {
            name: " Bob ".to_string(),
            message: "yo".to_string(),
            profile_emoji: String::new(),
        };
        let PlannedWrite::Create(data) = draft.plan(&FormMode::Create) else {
            panic!("expected a create");
        };
        assert_eq!(data.fields.get("name"), Some(&json!("Bob")));
        assert_eq!(data.fields.get("isPinned"), Some(&json!(false)));
        assert_eq!(data.fields.get("profileEmoji"), Some(&json!(DEFAULT_PROFILE_EMOJI)));
    }

    #[test]
    fn test_edit_touches_only_name_and_message() {
        let draft = CommentDraft {
            name: "Ann".to_string(),
            message: "edited".to_string(),
            profile_emoji: "🚀".to_string(),
        };
        let PlannedWrite::Update { id, data } = draft.plan(&FormMode::Edit {
            id: "c1".to_string(),
        }) else {
            panic!("expected an update");
        };
        assert_eq!(id, "c1");
        assert_eq!(data.fields.len(), 2);
        assert!(data.transforms.is_empty());
    }
}
