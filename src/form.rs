//! Create/edit form state machine for one record kind.
//!
//! `Closed -> Editing` on open, `Editing -> Closed` on cancel or on a
//! successful submit. A failed validation or a rejected store write keeps the
//! form in `Editing` with the draft intact.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::models::{Draft, FormMode, PlannedWrite, Record, ValidationErrors};
use crate::store::DocumentStore;
use crate::sync::CollectionSync;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FormState<D> {
    Closed,
    Editing {
        mode: FormMode,
        draft: D,
        errors: ValidationErrors,
        error: Option<String>,
    },
}

pub struct FormController<R: Record> {
    state: FormState<R::Draft>,
}

impl<R: Record> Default for FormController<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> FormController<R> {
    pub fn new() -> Self {
        Self {
            state: FormState::Closed,
        }
    }

    pub fn state(&self) -> &FormState<R::Draft> {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, FormState::Editing { .. })
    }

    pub fn mode(&self) -> Option<&FormMode> {
        match &self.state {
            FormState::Editing { mode, .. } => Some(mode),
            FormState::Closed => None,
        }
    }

    pub fn draft(&self) -> Option<&R::Draft> {
        match &self.state {
            FormState::Editing { draft, .. } => Some(draft),
            FormState::Closed => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut R::Draft> {
        match &mut self.state {
            FormState::Editing { draft, .. } => Some(draft),
            FormState::Closed => None,
        }
    }

    pub fn errors(&self) -> Option<&ValidationErrors> {
        match &self.state {
            FormState::Editing { errors, .. } => Some(errors),
            FormState::Closed => None,
        }
    }

    /// Last store error shown on the form.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FormState::Editing { error, .. } => error.as_deref(),
            FormState::Closed => None,
        }
    }

    pub fn open_for_create(&mut self) {
        self.state = FormState::Editing {
            mode: FormMode::Create,
            draft: R::Draft::default(),
            errors: ValidationErrors::new(),
            error: None,
        };
    }

    pub fn open_for_edit(&mut self, record: &R) -> DashboardResult<()> {
        if !R::KIND.schema().editable {
            return Err(DashboardError::ReadOnly(R::KIND));
        }
        self.state = FormState::Editing {
            mode: FormMode::Edit {
                id: record.id().to_string(),
            },
            draft: R::Draft::from_record(record),
            errors: ValidationErrors::new(),
            error: None,
        };
        Ok(())
    }

    pub fn set_draft(&mut self, new_draft: R::Draft) -> DashboardResult<()> {
        match self.draft_mut() {
            Some(draft) => {
                *draft = new_draft;
                Ok(())
            }
            None => Err(DashboardError::FormClosed),
        }
    }

    pub fn cancel(&mut self) {
        self.state = FormState::Closed;
    }

    /// Validates the draft and writes it. On success the local list is
    /// patched (when a sync is given), the form closes and the document id is
    /// returned.
    pub async fn submit(
        &mut self,
        store: &dyn DocumentStore,
        sync: Option<&CollectionSync<R>>,
    ) -> DashboardResult<String> {
        let (mode, draft) = match &mut self.state {
            FormState::Closed => return Err(DashboardError::FormClosed),
            FormState::Editing {
                mode,
                draft,
                errors,
                error,
            } => {
                *error = None;
                if let Err(invalid) = draft.validate(mode) {
                    *errors = invalid.clone();
                    return Err(DashboardError::Validation(invalid));
                }
                *errors = ValidationErrors::new();
                (mode.clone(), draft.clone())
            }
        };

        let collection = R::KIND.collection();
        let written = match draft.plan(&mode) {
            PlannedWrite::Create(data) => store.create(&collection, data).await,
            PlannedWrite::Upsert { id, data } => store
                .upsert(&collection.doc(id.clone()), data)
                .await
                .map(|()| id),
            PlannedWrite::Update { id, data } => store
                .update_fields(&collection.doc(id.clone()), data)
                .await
                .map(|()| id),
        };

        match written {
            Ok(id) => {
                if let Some(sync) = sync {
                    let previous = sync.find(&id);
                    sync.apply_local(draft.to_record(&id, previous.as_ref()));
                }
                self.state = FormState::Closed;
                info!(
                    collection = R::KIND.as_str(),
                    id = %id,
                    edit = mode.is_edit(),
                    "Record saved"
                );
                Ok(id)
            }
            Err(e) => {
                warn!(collection = R::KIND.as_str(), "Save failed: {}", e);
                if let FormState::Editing { error, .. } = &mut self.state {
                    *error = Some(e.to_string());
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comment, CommentDraft, Contact, Project, ProjectDraft};
    use crate::store::memory::InMemoryStore;
    use crate::store::{CollectionRef, WriteData};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_invalid_project_never_reaches_store() {
        let store = InMemoryStore::new();
        let mut form = FormController::<Project>::new();
        form.open_for_create();
        form.set_draft(ProjectDraft {
            id: "p1".to_string(),
            description: "desc".to_string(),
            category: "Web".to_string(),
            ..Default::default()
        })
        .unwrap();

        let err = form.submit(&store, None).await.unwrap_err();
        assert!(matches!(err, DashboardError::Validation(_)));
        assert!(form.is_open());
        assert!(form.errors().unwrap().contains("Title"));
        assert!(store.documents("projects").is_empty());
    }

    #[tokio::test]
    async fn test_new_comment_is_created_and_patched_locally() {
        let store = InMemoryStore::new();
        store
            .create(
                &CollectionRef::new("comments"),
                WriteData::new()
                    .set("name", "Ann")
                    .set("message", "hi")
                    .set("isPinned", false),
            )
            .await
            .unwrap();
        let sync = CollectionSync::<Comment>::new(Arc::new(store.clone()));
        sync.subscribe_default().await;
        assert!(sync.wait_for_load(Duration::from_secs(2)).await);

        let mut form = FormController::<Comment>::new();
        form.open_for_create();
        form.set_draft(CommentDraft {
            name: "Bob".to_string(),
            message: "yo".to_string(),
            ..Default::default()
        })
        .unwrap();
        let id = form.submit(&store, Some(&sync)).await.unwrap();

        assert!(!form.is_open());
        assert_eq!(id.len(), 20);
        let stored = store.document("comments", &id).unwrap();
        assert_eq!(stored["name"], "Bob");
        assert_eq!(stored["isPinned"], false);
        assert!(sync.wait_for(Duration::from_secs(2), |s| s.records.len() == 2).await);
        assert!(sync.records().iter().all(|c| !c.is_pinned));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_draft_and_message() {
        let store = InMemoryStore::new();
        store.deny_collection("comments", "Missing or insufficient permissions.");
        let mut form = FormController::<Comment>::new();
        form.open_for_create();
        let draft = CommentDraft {
            name: "Ann".to_string(),
            message: "hello".to_string(),
            ..Default::default()
        };
        form.set_draft(draft.clone()).unwrap();

        let err = form.submit(&store, None).await.unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(form.error(), Some("Missing or insufficient permissions."));
        assert_eq!(form.draft(), Some(&draft));

        store.allow_collection("comments");
        assert!(form.submit(&store, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_edit_merges_fields_and_keeps_pin() {
        let store = InMemoryStore::new();
        let id = store
            .create(
                &CollectionRef::new("comments"),
                WriteData::new()
                    .set("name", "Ann")
                    .set("message", "hi")
                    .set("isPinned", true),
            )
            .await
            .unwrap();
        let sync = CollectionSync::<Comment>::new(Arc::new(store.clone()));
        sync.subscribe_default().await;
        assert!(sync.wait_for_load(Duration::from_secs(2)).await);

        let mut form = FormController::<Comment>::new();
        form.open_for_edit(&sync.find(&id).unwrap()).unwrap();
        form.draft_mut().unwrap().message = "edited".to_string();
        form.submit(&store, Some(&sync)).await.unwrap();

        let stored = store.document("comments", &id).unwrap();
        assert_eq!(stored["message"], "edited");
        assert_eq!(stored["isPinned"], true);
        assert!(sync.find(&id).unwrap().is_pinned);
    }

    #[tokio::test]
    async fn test_contacts_cannot_be_edited_and_closed_form_rejects_submit() {
        let mut form = FormController::<Contact>::new();
        let err = form.open_for_edit(&Contact::default()).unwrap_err();
        assert!(matches!(err, DashboardError::ReadOnly(_)));

        let store = InMemoryStore::new();
        assert!(matches!(
            form.submit(&store, None).await,
            Err(DashboardError::FormClosed)
        ));
    }

    #[tokio::test]
    async fn test_cancel_discards_draft() {
        let mut form = FormController::<Comment>::new();
        form.open_for_create();
        form.draft_mut().unwrap().name = "Ann".to_string();
        form.cancel();
        assert!(form.draft().is_none());
        assert!(matches!(form.state(), FormState::Closed));
    }
}
