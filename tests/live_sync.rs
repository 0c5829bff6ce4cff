//! End-to-end behaviour of the live views against the in-memory store: one
//! listener per mounted view, remote writes fanning out to every view, and
//! store failures surfacing as view errors.

use std::sync::Arc;
use std::time::Duration;

use portfolio_dashboard::dashboard::AdminDashboard;
use portfolio_dashboard::models::{Comment, CommentDraft, FormMode, Project, ProjectDraft, RecordKind};
use portfolio_dashboard::projector::ViewQuery;
use portfolio_dashboard::public::PublicSite;
use portfolio_dashboard::store::memory::InMemoryStore;
use portfolio_dashboard::store::{CollectionRef, DocumentStore, WriteData};

const WAIT: Duration = Duration::from_secs(2);

/// Polls `check` until it holds; listeners apply snapshots on their own task.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn project(id: &str, title: &str, category: &str) -> ProjectDraft {
    ProjectDraft {
        id: id.to_string(),
        title: title.to_string(),
        description: "desc".to_string(),
        category: category.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn switching_tabs_never_leaks_listeners() {
    let store = InMemoryStore::new();
    let mut dashboard = AdminDashboard::new(Arc::new(store.clone()));

    for kind in [
        RecordKind::Contacts,
        RecordKind::Comments,
        RecordKind::Projects,
        RecordKind::Comments,
        RecordKind::Certificates,
    ] {
        dashboard.activate(kind).await;
        assert!(dashboard.wait_for_load(WAIT).await);
        for other in RecordKind::ALL {
            let expected = usize::from(other == kind);
            assert_eq!(store.listener_count(other.as_str()), expected, "{kind} active, {other}");
        }
    }

    dashboard.deactivate();
    for kind in RecordKind::ALL {
        assert_eq!(store.listener_count(kind.as_str()), 0);
    }
}

#[tokio::test]
async fn admin_writes_reach_the_public_site() {
    let store = InMemoryStore::new();
    let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
    let site = PublicSite::new(shared.clone());
    site.mount().await;
    assert!(site.wait_until_loaded(WAIT).await);

    let mut dashboard = AdminDashboard::new(shared);
    dashboard.activate(RecordKind::Projects).await;
    assert!(dashboard.wait_for_load(WAIT).await);
    dashboard
        .save::<Project>(FormMode::Create, project("quest", "Quest", "Game"))
        .await
        .unwrap();
    dashboard
        .save::<Project>(FormMode::Create, project("site", "Site", "Web"))
        .await
        .unwrap();

    // Two live listeners on projects: the admin tab and the public page.
    assert_eq!(store.listener_count("projects"), 2);

    assert!(eventually(|| site.projects(&ViewQuery::default()).records.len() == 2).await);
    let games = site.projects(&ViewQuery::default().with_category("Game"));
    assert_eq!(games.records.len(), 1);
    assert_eq!(games.records[0].title, "Quest");
    assert_eq!(site.project("site").map(|p| p.category).as_deref(), Some("Web"));

    site.unmount();
    assert_eq!(store.listener_count("projects"), 1);
}

#[tokio::test]
async fn visitor_comment_shows_up_in_admin_tab() {
    let store = InMemoryStore::new();
    let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
    let site = PublicSite::new(shared.clone());
    let mut dashboard = AdminDashboard::new(shared);
    dashboard.activate(RecordKind::Comments).await;
    assert!(dashboard.wait_for_load(WAIT).await);

    let id = site
        .post_comment(CommentDraft {
            name: "Visitor".to_string(),
            message: "Hello from the wall".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let sync = dashboard.sync_for::<Comment>();
    assert!(sync.wait_for(WAIT, |s| s.records.iter().any(|c| c.id == id)).await);

    dashboard.pin_comment(&id).await.unwrap();
    assert!(sync.find(&id).unwrap().is_pinned);
}

#[tokio::test]
async fn listener_failure_is_reported_and_recoverable() {
    let store = InMemoryStore::new();
    store
        .create(
            &CollectionRef::new("comments"),
            WriteData::new()
                .set("name", "Ann")
                .set("message", "hi")
                .server_timestamp("createdAt"),
        )
        .await
        .unwrap();

    let site = PublicSite::new(Arc::new(store.clone()));
    site.mount().await;
    assert!(site.wait_until_loaded(WAIT).await);
    assert_eq!(site.comment_wall().comments.len(), 1);

    store.fail_listeners("comments", "The service is currently unavailable.");
    assert_eq!(store.listener_count("comments"), 0);

    assert!(eventually(|| site.comment_wall().error.is_some()).await);
    let wall = site.comment_wall();
    assert_eq!(wall.error.as_deref(), Some("The service is currently unavailable."));
    assert!(!wall.loading);

    // A fresh mount resubscribes and clears the error.
    site.unmount();
    site.mount().await;
    assert!(site.wait_until_loaded(WAIT).await);
    let wall = site.comment_wall();
    assert!(wall.error.is_none());
    assert_eq!(wall.comments.len(), 1);
    assert_eq!(store.listener_count("comments"), 1);
}

#[tokio::test]
async fn denied_collection_surfaces_permission_error() {
    let store = InMemoryStore::new();
    store.deny_collection("contacts", "Missing or insufficient permissions.");

    let mut dashboard = AdminDashboard::new(Arc::new(store.clone()));
    dashboard.activate(RecordKind::Contacts).await;
    assert!(dashboard.wait_for_load(WAIT).await);

    let view = dashboard.snapshot().unwrap();
    assert!(!view.loading);
    assert_eq!(view.error.as_deref(), Some("Missing or insufficient permissions."));
    assert!(view.records.is_empty());
}
