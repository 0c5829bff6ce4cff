//! Portfolio projects. Keyed by an administrator-assigned id and written with
//! upserts so a project keeps a stable, human-readable key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    join_list, lenient_link, lenient_text, lenient_timestamp, list_or_text, or_placeholder,
    split_list, text_or_list, Draft, FieldValue, FormMode, KindSchema, PlannedWrite, Record,
    RecordKind, ValidationErrors, PLACEHOLDER,
};
use crate::store::{Direction, WriteData};

pub const PROJECT_CATEGORIES: [&str; 5] = ["Project", "Materi", "Web", "Game", "Ilustrasi"];

pub static SCHEMA: KindSchema = KindSchema {
    collection: "projects",
    label: "Projects",
    singular: "project",
    search_fields: &["Title", "Description", "category"],
    export_header: "ID,Title,Description,Img,Github,Link,TechStack,Features,Category",
    export_fields: &[
        "id",
        "Title",
        "Description",
        "Img",
        "Github",
        "Link",
        "TechStack",
        "Features",
        "category",
    ],
    default_order: Some(("createdAt", Direction::Desc)),
    editable: true,
    has_category: true,
};

fn placeholder() -> String {
    PLACEHOLDER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Title", default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(rename = "Description", default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(rename = "Img", default = "placeholder", deserialize_with = "lenient_link")]
    pub img: String,
    #[serde(rename = "Github", default = "placeholder", deserialize_with = "lenient_link")]
    pub github: String,
    #[serde(rename = "Link", default = "placeholder", deserialize_with = "lenient_link")]
    pub link: String,
    #[serde(rename = "TechStack", default, deserialize_with = "list_or_text")]
    pub tech_stack: Vec<String>,
    #[serde(rename = "Features", default, deserialize_with = "list_or_text")]
    pub features: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: String,
    #[serde(rename = "createdAt", default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Project {
    const KIND: RecordKind = RecordKind::Projects;
    type Draft = ProjectDraft;

    fn id(&self) -> &str {
        &self.id
    }

    fn field(&self, key: &str) -> FieldValue<'_> {
        match key {
            "id" => FieldValue::Text(&self.id),
            "Title" => FieldValue::Text(&self.title),
            "Description" => FieldValue::Text(&self.description),
            "Img" => FieldValue::Text(&self.img),
            "Github" => FieldValue::Text(&self.github),
            "Link" => FieldValue::Text(&self.link),
            "TechStack" => FieldValue::List(&self.tech_stack),
            "Features" => FieldValue::List(&self.features),
            "category" => FieldValue::Text(&self.category),
            "createdAt" => FieldValue::Timestamp(self.created_at),
            "updatedAt" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Missing,
        }
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }
}

/// Project form. List fields are edited as comma-separated text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Img", default)]
    pub img: String,
    #[serde(rename = "Github", default)]
    pub github: String,
    #[serde(rename = "Link", default)]
    pub link: String,
    #[serde(rename = "TechStack", default, deserialize_with = "text_or_list")]
    pub tech_stack: String,
    #[serde(rename = "Features", default, deserialize_with = "text_or_list")]
    pub features: String,
    #[serde(default)]
    pub category: String,
}

/// Checks an administrator-assigned document id.
pub(crate) fn validate_assigned_id(errors: &mut ValidationErrors, id: &str, mode: &FormMode) {
    let id = id.trim();
    if id.is_empty() {
        errors.add("id", "ID is required");
    } else if id.contains('/') {
        errors.add("id", "ID cannot contain '/'");
    }
    if let FormMode::Edit { id: original } = mode {
        if !id.is_empty() && id != original {
            errors.add("id", "ID cannot be changed while editing");
        }
    }
}

impl Draft for ProjectDraft {
    type Record = Project;

    fn from_record(record: &Project) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            img: record.img.clone(),
            github: record.github.clone(),
            link: record.link.clone(),
            tech_stack: join_list(&record.tech_stack),
            features: join_list(&record.features),
            category: record.category.clone(),
        }
    }

    fn validate(&self, mode: &FormMode) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_assigned_id(&mut errors, &self.id, mode);
        errors.require("Title", "Title", &self.title);
        errors.require("Description", "Description", &self.description);
        let category = self.category.trim();
        if category.is_empty() {
            errors.add("category", "Category is required");
        } else if !PROJECT_CATEGORIES.contains(&category) {
            errors.add(
                "category",
                format!("Category must be one of {}", PROJECT_CATEGORIES.join(", ")),
            );
        }
        errors.into_result()
    }

    fn plan(&self, _mode: &FormMode) -> PlannedWrite {
        let data = WriteData::new()
            .set("Title", self.title.trim())
            .set("Description", self.description.trim())
            .set("Img", or_placeholder(&self.img))
            .set("Github", or_placeholder(&self.github))
            .set("Link", or_placeholder(&self.link))
            .set("TechStack", split_list(&self.tech_stack))
            .set("Features", split_list(&self.features))
            .set("category", self.category.trim())
            .server_timestamp_on_create("createdAt")
            .server_timestamp("updatedAt");
        PlannedWrite::Upsert {
            id: self.id.trim().to_string(),
            data,
        }
    }

    fn to_record(&self, id: &str, previous: Option<&Project>) -> Project {
        Project {
            id: id.to_string(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            img: or_placeholder(&self.img),
            github: or_placeholder(&self.github),
            link: or_placeholder(&self.link),
            tech_stack: split_list(&self.tech_stack),
            features: split_list(&self.features),
            category: self.category.trim().to_string(),
            created_at: previous.and_then(|p| p.created_at),
            updated_at: previous.and_then(|p| p.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;
    use serde_json::json;

    fn draft() -> ProjectDraft {
        ProjectDraft {
            id: "portfolio".to_string(),
            title: "Portfolio".to_string(),
            description: "Personal site".to_string(),
            tech_stack: "React, Tailwind".to_string(),
            category: "Web".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_title_fails_validation() {
        let mut d = draft();
        d.title = "   ".to_string();
        let errors = d.validate(&FormMode::Create).unwrap_err();
        assert_eq!(errors.get("Title"), Some("Title is required"));
    }

    #[test]
    fn test_unknown_category_and_all_are_rejected() {
        for category in ["All", "Blog"] {
            let mut d = draft();
            d.category = category.to_string();
            assert!(d.validate(&FormMode::Create).unwrap_err().contains("category"));
        }
    }

    #[test]
    fn test_id_cannot_change_in_edit_mode() {
        let mut d = draft();
        d.id = "renamed".to_string();
        let errors = d
            .validate(&FormMode::Edit {
                id: "portfolio".to_string(),
            })
            .unwrap_err();
        assert_eq!(errors.get("id"), Some("ID cannot be changed while editing"));
    }

    #[test]
    fn test_plan_upserts_with_placeholders_and_lists() {
        let PlannedWrite::Upsert { id, data } = draft().plan(&FormMode::Create) else {
            panic!("expected an upsert");
        };
        assert_eq!(id, "portfolio");
        assert_eq!(data.fields.get("Img"), Some(&json!(PLACEHOLDER)));
        assert_eq!(data.fields.get("TechStack"), Some(&json!(["React", "Tailwind"])));
        assert_eq!(data.fields.get("Features"), Some(&json!([])));
    }

    #[test]
    fn test_stored_text_lists_are_split() {
        let fields = json!({
            "Title": "Game",
            "TechStack": "Unity, C#",
            "Features": ["Multiplayer", ""],
            "category": "Game"
        });
        let project =
            Project::from_document(&Document::new("g1", fields.as_object().cloned().unwrap()))
                .unwrap();
        assert_eq!(project.tech_stack, vec!["Unity", "C#"]);
        assert_eq!(project.features, vec!["Multiplayer"]);
        assert_eq!(project.img, PLACEHOLDER);

        let draft = ProjectDraft::from_record(&project);
        assert_eq!(draft.tech_stack, "Unity, C#");
    }
}
