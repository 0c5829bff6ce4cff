/**
 * Public Routes
 * Visitor-facing views backed by the live public collections: the comment
 * wall, projects and certificates, plus comment and contact submission
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::DashboardError;
use crate::models::{Certificate, CommentDraft, ContactDraft, Project};
use crate::projector::ViewQuery;
use crate::public::{CommentWall, PublicList};
use crate::routes::{parse_body, CreatedResponse};
use crate::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub search: String,
    pub category: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/comments
pub async fn list_comments(State(state): State<AppState>) -> Json<CommentWall> {
    state.public.wait_until_loaded(state.config.view_settle).await;
    Json(state.public.comment_wall())
}

/// POST /api/comments
pub async fn post_comment(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CreatedResponse>), DashboardError> {
    let draft: CommentDraft = parse_body(body)?;
    let id = state.public.post_comment(draft).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// POST /api/contacts
pub async fn send_contact(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CreatedResponse>), DashboardError> {
    let draft: ContactDraft = parse_body(body)?;
    let id = state.public.send_contact(draft).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /api/projects?search=&category=
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Json<PublicList<Project>> {
    state.public.wait_until_loaded(state.config.view_settle).await;
    let mut view = ViewQuery::search(params.search);
    if let Some(category) = params.category {
        view = view.with_category(category);
    }
    Json(state.public.projects(&view))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, DashboardError> {
    state.public.wait_until_loaded(state.config.view_settle).await;
    state
        .public
        .project(&id)
        .map(Json)
        .ok_or(DashboardError::NotFound(id))
}

/// GET /api/certificates?search=
pub async fn list_certificates(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Json<PublicList<Certificate>> {
    state.public.wait_until_loaded(state.config.view_settle).await;
    Json(state.public.certificates(&params.search))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{send, state_with};
    use crate::store::memory::InMemoryStore;
    use crate::store::{CollectionRef, DocumentStore, WriteData};
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;

    async fn app(store: InMemoryStore) -> Router {
        let state = state_with(store);
        state.public.mount().await;
        Router::new()
            .route("/api/comments", get(list_comments).post(post_comment))
            .route("/api/contacts", axum::routing::post(send_contact))
            .route("/api/projects", get(list_projects))
            .route("/api/projects/{id}", get(get_project))
            .route("/api/certificates", get(list_certificates))
            .with_state(state)
    }

    async fn seed_projects(store: &InMemoryStore) {
        let projects = CollectionRef::new("projects");
        for (id, title, category) in [("p1", "Portfolio Site", "Web"), ("p2", "Dungeon", "Game")] {
            store
                .upsert(
                    &projects.doc(id),
                    WriteData::new()
                        .set("Title", title)
                        .set("Description", "desc")
                        .set("category", category)
                        .server_timestamp("createdAt"),
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_projects_filter_and_detail() {
        let store = InMemoryStore::new();
        seed_projects(&store).await;
        let app = app(store).await;

        let (code, body) = send(app.clone(), "GET", "/api/projects?category=Game", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["loading"], false);
        assert_eq!(body["records"].as_array().unwrap().len(), 1);
        assert_eq!(body["records"][0]["Title"], "Dungeon");

        let (_, body) = send(app.clone(), "GET", "/api/projects?category=All", None).await;
        assert_eq!(body["records"].as_array().unwrap().len(), 2);

        let (code, body) = send(app.clone(), "GET", "/api/projects/p1", None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["Title"], "Portfolio Site");

        let (code, body) = send(app, "GET", "/api/projects/missing", None).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_visitor_comment_appears_on_wall() {
        let app = app(InMemoryStore::new()).await;

        let (code, body) = send(
            app.clone(),
            "POST",
            "/api/comments",
            Some(json!({"name": "Dee", "message": "Great portfolio"})),
        )
        .await;
        assert_eq!(code, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let (_, wall) = send(app, "GET", "/api/comments", None).await;
        assert!(wall["pinned"].is_null());
        assert_eq!(wall["comments"][0]["id"], id.as_str());
        assert_eq!(wall["comments"][0]["profileEmoji"], "😊");
    }

    #[tokio::test]
    async fn test_invalid_contact_is_rejected_with_fields() {
        let store = InMemoryStore::new();
        let app = app(store.clone()).await;

        let (code, body) = send(
            app.clone(),
            "POST",
            "/api/contacts",
            Some(json!({"name": "Dee", "email": "dee@", "message": ""})),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["email"].is_string());
        assert!(body["fields"]["message"].is_string());
        assert!(store.documents("contacts").is_empty());

        let (code, _) = send(
            app,
            "POST",
            "/api/contacts",
            Some(json!({"name": "Dee", "email": "dee@example.com", "message": "Hi"})),
        )
        .await;
        assert_eq!(code, StatusCode::CREATED);
        assert_eq!(store.documents("contacts").len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_verbatim() {
        let store = InMemoryStore::new();
        let app = app(store.clone()).await;
        store.deny_collection("comments", "Missing or insufficient permissions.");

        let (code, body) = send(
            app,
            "POST",
            "/api/comments",
            Some(json!({"name": "Dee", "message": "Hi"})),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Missing or insufficient permissions.");
    }
}
