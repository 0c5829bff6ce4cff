//! Admin dashboard view.
//!
//! One [`CollectionSync`] per record kind, of which only the active tab is
//! subscribed. The visible list is always the projection of the active tab's
//! records through the current search, category and sort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{DashboardError, DashboardResult};
use crate::export::{export_today, CsvExport};
use crate::form::FormController;
use crate::models::{
    Certificate, Comment, Contact, FormMode, Project, Record, RecordKind, ALL_CATEGORIES,
};
use crate::mutations::{self, BulkDeleteReport, Confirm};
use crate::projector::{project, SortSpec, ViewQuery};
use crate::store::DocumentStore;
use crate::sync::CollectionSync;

/// Exclusive flag held for the duration of one long-running action.
pub struct BusyGate {
    action: &'static str,
    busy: AtomicBool,
}

pub struct BusyGuard<'a> {
    gate: &'a BusyGate,
}

impl BusyGate {
    pub const fn new(action: &'static str) -> Self {
        Self {
            action,
            busy: AtomicBool::new(false),
        }
    }

    pub fn try_enter(&self) -> DashboardResult<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DashboardError::Busy(self.action));
        }
        Ok(BusyGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Projected records of the active tab.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum VisibleRecords {
    Contacts(Vec<Contact>),
    Comments(Vec<Comment>),
    Projects(Vec<Project>),
    Certificates(Vec<Certificate>),
}

impl VisibleRecords {
    pub fn len(&self) -> usize {
        match self {
            VisibleRecords::Contacts(r) => r.len(),
            VisibleRecords::Comments(r) => r.len(),
            VisibleRecords::Projects(r) => r.len(),
            VisibleRecords::Certificates(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub tab: RecordKind,
    pub loading: bool,
    pub error: Option<String>,
    pub query: ViewQuery,
    /// Records in the collection before filtering.
    pub total: usize,
    pub submitting: bool,
    pub bulk_deleting: bool,
    pub records: VisibleRecords,
}

pub struct AdminDashboard {
    store: Arc<dyn DocumentStore>,
    contacts: CollectionSync<Contact>,
    comments: CollectionSync<Comment>,
    projects: CollectionSync<Project>,
    certificates: CollectionSync<Certificate>,
    active: Option<RecordKind>,
    query: ViewQuery,
    submitting: BusyGate,
    bulk_deleting: BusyGate,
}

/// Record kinds the dashboard holds a live collection for.
pub trait DashboardCollection: Record {
    fn sync(dashboard: &AdminDashboard) -> &CollectionSync<Self>;

    fn visible(records: Vec<Self>) -> VisibleRecords;
}

impl DashboardCollection for Contact {
    fn sync(dashboard: &AdminDashboard) -> &CollectionSync<Self> {
        &dashboard.contacts
    }

    fn visible(records: Vec<Self>) -> VisibleRecords {
        VisibleRecords::Contacts(records)
    }
}

impl DashboardCollection for Comment {
    fn sync(dashboard: &AdminDashboard) -> &CollectionSync<Self> {
        &dashboard.comments
    }

    fn visible(records: Vec<Self>) -> VisibleRecords {
        VisibleRecords::Comments(records)
    }
}

impl DashboardCollection for Project {
    fn sync(dashboard: &AdminDashboard) -> &CollectionSync<Self> {
        &dashboard.projects
    }

    fn visible(records: Vec<Self>) -> VisibleRecords {
        VisibleRecords::Projects(records)
    }
}

impl DashboardCollection for Certificate {
    fn sync(dashboard: &AdminDashboard) -> &CollectionSync<Self> {
        &dashboard.certificates
    }

    fn visible(records: Vec<Self>) -> VisibleRecords {
        VisibleRecords::Certificates(records)
    }
}

impl AdminDashboard {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            contacts: CollectionSync::new(store.clone()),
            comments: CollectionSync::new(store.clone()),
            projects: CollectionSync::new(store.clone()),
            certificates: CollectionSync::new(store.clone()),
            store,
            active: None,
            query: ViewQuery::default(),
            submitting: BusyGate::new("submission"),
            bulk_deleting: BusyGate::new("bulk delete"),
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn active_tab(&self) -> Option<RecordKind> {
        self.active
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn sync_for<R: DashboardCollection>(&self) -> &CollectionSync<R> {
        R::sync(self)
    }

    pub fn is_subscribed(&self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::Contacts => self.contacts.is_subscribed(),
            RecordKind::Comments => self.comments.is_subscribed(),
            RecordKind::Projects => self.projects.is_subscribed(),
            RecordKind::Certificates => self.certificates.is_subscribed(),
        }
    }

    fn unsubscribe_kind(&self, kind: RecordKind) {
        match kind {
            RecordKind::Contacts => self.contacts.unsubscribe(),
            RecordKind::Comments => self.comments.unsubscribe(),
            RecordKind::Projects => self.projects.unsubscribe(),
            RecordKind::Certificates => self.certificates.unsubscribe(),
        };
    }

    async fn subscribe_kind(&self, kind: RecordKind) {
        match kind {
            RecordKind::Contacts => self.contacts.subscribe_default().await,
            RecordKind::Comments => self.comments.subscribe_default().await,
            RecordKind::Projects => self.projects.subscribe_default().await,
            RecordKind::Certificates => self.certificates.subscribe_default().await,
        }
    }

    /// Switches tab: the previous tab is unsubscribed before the new one is
    /// subscribed. Selecting the current tab does nothing.
    pub async fn activate(&mut self, kind: RecordKind) {
        if self.active == Some(kind) {
            return;
        }
        if let Some(previous) = self.active.take() {
            self.unsubscribe_kind(previous);
        }
        self.query = ViewQuery::default();
        self.active = Some(kind);
        self.subscribe_kind(kind).await;
        info!(tab = %kind, "Dashboard tab activated");
    }

    /// Unmounts the dashboard: no tab stays subscribed.
    pub fn deactivate(&mut self) {
        if let Some(previous) = self.active.take() {
            self.unsubscribe_kind(previous);
            info!(tab = %previous, "Dashboard tab closed");
        }
    }

    pub async fn wait_for_load(&self, timeout: std::time::Duration) -> bool {
        match self.active {
            Some(RecordKind::Contacts) => self.contacts.wait_for_load(timeout).await,
            Some(RecordKind::Comments) => self.comments.wait_for_load(timeout).await,
            Some(RecordKind::Projects) => self.projects.wait_for_load(timeout).await,
            Some(RecordKind::Certificates) => self.certificates.wait_for_load(timeout).await,
            None => true,
        }
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.query.search = term.into();
    }

    /// `None` or `"All"` clears the filter.
    pub fn set_category(&mut self, category: Option<String>) {
        self.query.category = category.filter(|c| !c.trim().is_empty() && c != ALL_CATEGORIES);
    }

    /// Selecting the current key again flips the direction.
    pub fn select_sort(&mut self, key: &str) -> SortSpec {
        let next = SortSpec::toggle(self.query.sort.as_ref(), key);
        self.query.sort = Some(next.clone());
        next
    }

    pub fn clear_sort(&mut self) {
        self.query.sort = None;
    }

    fn view_of<R: DashboardCollection>(&self, tab: RecordKind) -> DashboardView {
        let state = R::sync(self).state();
        let visible = project(&state.records, &self.query);
        DashboardView {
            tab,
            loading: state.loading,
            error: state.error,
            query: self.query.clone(),
            total: state.records.len(),
            submitting: self.submitting.is_busy(),
            bulk_deleting: self.bulk_deleting.is_busy(),
            records: R::visible(visible),
        }
    }

    pub fn snapshot(&self) -> DashboardResult<DashboardView> {
        let tab = self.active.ok_or(DashboardError::NoActiveTab)?;
        Ok(match tab {
            RecordKind::Contacts => self.view_of::<Contact>(tab),
            RecordKind::Comments => self.view_of::<Comment>(tab),
            RecordKind::Projects => self.view_of::<Project>(tab),
            RecordKind::Certificates => self.view_of::<Certificate>(tab),
        })
    }

    fn export_of<R: DashboardCollection>(&self) -> CsvExport {
        export_today(&project(&R::sync(self).records(), &self.query))
    }

    /// CSV of the current filtered view.
    pub fn export(&self) -> DashboardResult<CsvExport> {
        let tab = self.active.ok_or(DashboardError::NoActiveTab)?;
        let export = match tab {
            RecordKind::Contacts => self.export_of::<Contact>(),
            RecordKind::Comments => self.export_of::<Comment>(),
            RecordKind::Projects => self.export_of::<Project>(),
            RecordKind::Certificates => self.export_of::<Certificate>(),
        };
        info!(tab = %tab, file = %export.filename, "View exported");
        Ok(export)
    }

    /// Runs the form for one create or edit. Editing needs the record in
    /// the live list.
    pub async fn save<R: DashboardCollection>(
        &self,
        mode: FormMode,
        draft: R::Draft,
    ) -> DashboardResult<String> {
        if !R::KIND.schema().editable {
            return Err(DashboardError::ReadOnly(R::KIND));
        }
        let _busy = self.submitting.try_enter()?;
        let sync = R::sync(self);

        let mut form = FormController::<R>::new();
        match &mode {
            FormMode::Create => form.open_for_create(),
            FormMode::Edit { id } => {
                let record = sync
                    .find(id)
                    .ok_or_else(|| DashboardError::NotFound(id.clone()))?;
                form.open_for_edit(&record)?;
            }
        }
        form.set_draft(draft)?;
        form.submit(self.store(), Some(sync)).await
    }

    pub async fn delete<R: DashboardCollection>(
        &self,
        id: &str,
        confirm: &mut impl Confirm,
    ) -> DashboardResult<()> {
        mutations::delete_record(self.store(), Some(R::sync(self)), id, confirm).await
    }

    pub async fn bulk_delete<R: DashboardCollection>(
        &self,
        ids: &[String],
        confirm: &mut impl Confirm,
    ) -> DashboardResult<BulkDeleteReport> {
        let _busy = self.bulk_deleting.try_enter()?;
        mutations::bulk_delete(self.store(), Some(R::sync(self)), ids, confirm).await
    }

    pub async fn pin_comment(&self, id: &str) -> DashboardResult<()> {
        mutations::pin_comment(self.store(), Some(&self.comments), id).await
    }

    pub async fn unpin_comment(&self, id: &str) -> DashboardResult<()> {
        mutations::unpin_comment(self.store(), Some(&self.comments), id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactDraft, ProjectDraft};
    use crate::store::memory::InMemoryStore;
    use crate::store::{CollectionRef, Direction, WriteData};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (id, title, category) in [("1", "Site", "Web"), ("2", "Quest", "Game")] {
            store
                .upsert(
                    &CollectionRef::new("projects").doc(id),
                    WriteData::new()
                        .set("Title", title)
                        .set("Description", "d")
                        .set("category", category)
                        .server_timestamp_on_create("createdAt"),
                )
                .await
                .unwrap();
        }
        store
    }

    fn project_ids(view: &DashboardView) -> Vec<String> {
        match &view.records {
            VisibleRecords::Projects(p) => p.iter().map(|p| p.id.clone()).collect(),
            other => panic!("unexpected records {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_active_tab_is_subscribed() {
        let store = seeded().await;
        let mut dashboard = AdminDashboard::new(Arc::new(store.clone()));

        dashboard.activate(RecordKind::Projects).await;
        assert_eq!(store.listener_count("projects"), 1);

        dashboard.activate(RecordKind::Projects).await;
        assert_eq!(store.listener_count("projects"), 1);

        dashboard.activate(RecordKind::Comments).await;
        assert_eq!(store.listener_count("projects"), 0);
        assert_eq!(store.listener_count("comments"), 1);
        assert!(!dashboard.is_subscribed(RecordKind::Projects));

        dashboard.deactivate();
        assert_eq!(store.listener_count("comments"), 0);
    }

    #[tokio::test]
    async fn test_view_applies_category_and_sort_toggle() {
        let store = seeded().await;
        let mut dashboard = AdminDashboard::new(Arc::new(store));
        dashboard.activate(RecordKind::Projects).await;
        assert!(dashboard.wait_for_load(WAIT).await);

        // Newest first by default.
        assert_eq!(project_ids(&dashboard.snapshot().unwrap()), ["2", "1"]);

        dashboard.set_category(Some("Web".to_string()));
        assert_eq!(project_ids(&dashboard.snapshot().unwrap()), ["1"]);

        dashboard.set_category(Some(ALL_CATEGORIES.to_string()));
        assert_eq!(dashboard.select_sort("Title").direction, Direction::Asc);
        assert_eq!(project_ids(&dashboard.snapshot().unwrap()), ["2", "1"]);
        assert_eq!(dashboard.select_sort("Title").direction, Direction::Desc);
        assert_eq!(project_ids(&dashboard.snapshot().unwrap()), ["1", "2"]);
    }

    #[tokio::test]
    async fn test_contacts_are_read_only() {
        let mut dashboard = AdminDashboard::new(Arc::new(InMemoryStore::new()));
        dashboard.activate(RecordKind::Contacts).await;
        let err = dashboard
            .save::<Contact>(FormMode::Create, ContactDraft::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::ReadOnly(RecordKind::Contacts)));
    }

    #[tokio::test]
    async fn test_edit_of_unknown_record_is_not_found() {
        let store = seeded().await;
        let mut dashboard = AdminDashboard::new(Arc::new(store));
        dashboard.activate(RecordKind::Projects).await;
        assert!(dashboard.wait_for_load(WAIT).await);
        let err = dashboard
            .save::<Project>(
                FormMode::Edit {
                    id: "missing".to_string(),
                },
                ProjectDraft::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_save_creates_project_and_updates_view() {
        let store = seeded().await;
        let mut dashboard = AdminDashboard::new(Arc::new(store.clone()));
        dashboard.activate(RecordKind::Projects).await;
        assert!(dashboard.wait_for_load(WAIT).await);

        let id = dashboard
            .save::<Project>(
                FormMode::Create,
                ProjectDraft {
                    id: "3".to_string(),
                    title: "Sketches".to_string(),
                    description: "Drawings".to_string(),
                    category: "Ilustrasi".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(id, "3");
        assert!(store.document("projects", "3").is_some());
        assert_eq!(dashboard.snapshot().unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_busy_gate_rejects_second_entry() {
        let gate = BusyGate::new("submission");
        let guard = gate.try_enter().unwrap();
        assert!(matches!(
            gate.try_enter(),
            Err(DashboardError::Busy("submission"))
        ));
        drop(guard);
        assert!(gate.try_enter().is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_requires_a_tab() {
        let dashboard = AdminDashboard::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            dashboard.snapshot(),
            Err(DashboardError::NoActiveTab)
        ));
    }
}
