//! Public site views: the comment wall, the portfolio projects and the
//! certificates, kept live for as long as the site is mounted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::error::DashboardResult;
use crate::form::FormController;
use crate::models::{Certificate, Comment, CommentDraft, Contact, ContactDraft, Project};
use crate::projector::{project, ViewQuery};
use crate::store::DocumentStore;
use crate::sync::{CollectionSync, SyncState};

#[derive(Debug, Clone, Serialize)]
pub struct CommentWall {
    pub loading: bool,
    pub error: Option<String>,
    pub pinned: Option<Comment>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicList<R> {
    pub loading: bool,
    pub error: Option<String>,
    pub records: Vec<R>,
}

impl<R> PublicList<R> {
    fn from_state(state: SyncState<R>, records: Vec<R>) -> Self {
        Self {
            loading: state.loading,
            error: state.error,
            records,
        }
    }
}

pub struct PublicSite {
    store: Arc<dyn DocumentStore>,
    comments: CollectionSync<Comment>,
    projects: CollectionSync<Project>,
    certificates: CollectionSync<Certificate>,
    mounted: AtomicBool,
}

impl PublicSite {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            comments: CollectionSync::new(store.clone()),
            projects: CollectionSync::new(store.clone()),
            certificates: CollectionSync::new(store.clone()),
            store,
            mounted: AtomicBool::new(false),
        }
    }

    /// Subscribes the three public collections. Mounting twice is a no-op.
    pub async fn mount(&self) {
        if self.mounted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.comments.subscribe_default().await;
        self.projects.subscribe_default().await;
        self.certificates.subscribe_default().await;
        info!("Public site mounted");
    }

    pub fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::AcqRel) {
            return;
        }
        self.comments.unsubscribe();
        self.projects.unsubscribe();
        self.certificates.unsubscribe();
        info!("Public site unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Waits for every public collection's first snapshot (or error).
    pub async fn wait_until_loaded(&self, timeout: Duration) -> bool {
        let (a, b, c) = tokio::join!(
            self.comments.wait_for_load(timeout),
            self.projects.wait_for_load(timeout),
            self.certificates.wait_for_load(timeout),
        );
        a && b && c
    }

    /// Newest first, with the pinned comment pulled out of the list.
    pub fn comment_wall(&self) -> CommentWall {
        let state = self.comments.state();
        let mut comments = state.records;
        let pinned = comments
            .iter()
            .position(|c| c.is_pinned)
            .map(|i| comments.remove(i));
        CommentWall {
            loading: state.loading,
            error: state.error,
            pinned,
            comments,
        }
    }

    pub fn projects(&self, view: &ViewQuery) -> PublicList<Project> {
        let state = self.projects.state();
        let records = project(&state.records, view);
        PublicList::from_state(state, records)
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.projects.find(id)
    }

    pub fn certificates(&self, search: &str) -> PublicList<Certificate> {
        let state = self.certificates.state();
        let records = project(&state.records, &ViewQuery::search(search));
        PublicList::from_state(state, records)
    }

    pub async fn post_comment(&self, draft: CommentDraft) -> DashboardResult<String> {
        let mut form = FormController::<Comment>::new();
        form.open_for_create();
        form.set_draft(draft)?;
        form.submit(self.store.as_ref(), Some(&self.comments)).await
    }

    /// Contacts are never listed publicly, so there is no local list to patch.
    pub async fn send_contact(&self, draft: ContactDraft) -> DashboardResult<String> {
        let mut form = FormController::<Contact>::new();
        form.open_for_create();
        form.set_draft(draft)?;
        form.submit(self.store.as_ref(), None).await
    }
}
