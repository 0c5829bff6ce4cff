/**
 * Admin Routes
 * Dashboard actions over the live collections: tab and view state, CSV
 * export, create/edit, confirmed deletes and comment pinning.
 *
 * Every route sits behind `require_login`. A route that names a record kind
 * first makes that kind the active tab, so the live list it operates on is
 * the one the administrator sees.
 */
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLockReadGuard;
use tracing::info;

use crate::dashboard::{AdminDashboard, DashboardCollection, DashboardView};
use crate::error::{DashboardError, DashboardResult};
use crate::models::{Certificate, Comment, Contact, FormMode, Project, RecordKind};
use crate::mutations::BulkDeleteReport;
use crate::routes::{parse_body, CreatedResponse, SuccessResponse};
use crate::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    pub tab: Option<RecordKind>,
}

/// UI actions applied to the dashboard view, in field order: tab first
/// (which resets the view), then search, category and sort.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewUpdate {
    pub tab: Option<RecordKind>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort_key: Option<String>,
    #[serde(default)]
    pub clear_sort: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub confirm: bool,
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_kind(raw: &str) -> DashboardResult<RecordKind> {
    raw.parse()
        .map_err(|_| DashboardError::NotFound(format!("unknown collection '{raw}'")))
}

/// Makes `kind` the active tab and waits for its first snapshot.
async fn focus(state: &AppState, kind: RecordKind) -> RwLockReadGuard<'_, AdminDashboard> {
    {
        let dashboard = state.admin.read().await;
        if dashboard.active_tab() == Some(kind) {
            dashboard.wait_for_load(state.config.view_settle).await;
            return dashboard;
        }
    }
    let mut dashboard = state.admin.write().await;
    dashboard.activate(kind).await;
    let dashboard = dashboard.downgrade();
    dashboard.wait_for_load(state.config.view_settle).await;
    dashboard
}

async fn save_as<R: DashboardCollection>(
    dashboard: &AdminDashboard,
    mode: FormMode,
    body: Value,
) -> DashboardResult<String> {
    let draft: R::Draft = parse_body(body)?;
    dashboard.save::<R>(mode, draft).await
}

async fn save_kind(
    state: &AppState,
    kind: RecordKind,
    mode: FormMode,
    body: Value,
) -> DashboardResult<String> {
    if !kind.schema().editable {
        return Err(DashboardError::ReadOnly(kind));
    }
    let dashboard = focus(state, kind).await;
    match kind {
        RecordKind::Contacts => save_as::<Contact>(&dashboard, mode, body).await,
        RecordKind::Comments => save_as::<Comment>(&dashboard, mode, body).await,
        RecordKind::Projects => save_as::<Project>(&dashboard, mode, body).await,
        RecordKind::Certificates => save_as::<Certificate>(&dashboard, mode, body).await,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/view?tab=
pub async fn get_view(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Result<Json<DashboardView>, DashboardError> {
    let dashboard = match params.tab {
        Some(kind) => focus(&state, kind).await,
        None => {
            let dashboard = state.admin.read().await;
            dashboard.wait_for_load(state.config.view_settle).await;
            dashboard
        }
    };
    Ok(Json(dashboard.snapshot()?))
}

/// PATCH /api/admin/view
pub async fn update_view(
    State(state): State<AppState>,
    Json(update): Json<ViewUpdate>,
) -> Result<Json<DashboardView>, DashboardError> {
    let mut dashboard = state.admin.write().await;
    if let Some(kind) = update.tab {
        dashboard.activate(kind).await;
    }
    if dashboard.active_tab().is_none() {
        return Err(DashboardError::NoActiveTab);
    }
    if let Some(search) = update.search {
        dashboard.set_search(search);
    }
    if let Some(category) = update.category {
        dashboard.set_category(Some(category));
    }
    if update.clear_sort {
        dashboard.clear_sort();
    }
    if let Some(key) = update.sort_key.as_deref() {
        dashboard.select_sort(key);
    }

    let dashboard = dashboard.downgrade();
    dashboard.wait_for_load(state.config.view_settle).await;
    Ok(Json(dashboard.snapshot()?))
}

/// GET /api/admin/export
/// CSV attachment of the current filtered view.
pub async fn export_view(State(state): State<AppState>) -> Result<Response, DashboardError> {
    let dashboard = state.admin.read().await;
    dashboard.wait_for_load(state.config.view_settle).await;
    let export = dashboard.export()?;
    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.content,
    )
        .into_response())
}

/// POST /api/admin/{kind}
pub async fn create_record(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CreatedResponse>), DashboardError> {
    let kind = parse_kind(&kind)?;
    let id = save_kind(&state, kind, FormMode::Create, body).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// PUT /api/admin/{kind}/{id}
/// A body without an `id` edits the record named in the path.
pub async fn update_record(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Json(mut body): Json<Value>,
) -> Result<Json<CreatedResponse>, DashboardError> {
    let kind = parse_kind(&kind)?;
    if let Value::Object(fields) = &mut body {
        fields
            .entry("id")
            .or_insert_with(|| Value::String(id.clone()));
    }
    let id = save_kind(&state, kind, FormMode::Edit { id }, body).await?;
    Ok(Json(CreatedResponse { id }))
}

/// DELETE /api/admin/{kind}/{id}?confirm=true
pub async fn delete_record(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Query(mut params): Query<ConfirmParams>,
) -> Result<Json<SuccessResponse>, DashboardError> {
    let kind = parse_kind(&kind)?;
    if !params.confirm {
        return Err(DashboardError::NotConfirmed);
    }
    let dashboard = focus(&state, kind).await;
    let confirm = &mut params.confirm;
    match kind {
        RecordKind::Contacts => dashboard.delete::<Contact>(&id, confirm).await?,
        RecordKind::Comments => dashboard.delete::<Comment>(&id, confirm).await?,
        RecordKind::Projects => dashboard.delete::<Project>(&id, confirm).await?,
        RecordKind::Certificates => dashboard.delete::<Certificate>(&id, confirm).await?,
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/admin/{kind}/bulk-delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(mut request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteReport>, DashboardError> {
    let kind = parse_kind(&kind)?;
    if request.ids.is_empty() {
        return Ok(Json(BulkDeleteReport::default()));
    }
    if !request.confirm {
        return Err(DashboardError::NotConfirmed);
    }
    let dashboard = focus(&state, kind).await;
    let ids = &request.ids;
    let confirm = &mut request.confirm;
    let report = match kind {
        RecordKind::Contacts => dashboard.bulk_delete::<Contact>(ids, confirm).await?,
        RecordKind::Comments => dashboard.bulk_delete::<Comment>(ids, confirm).await?,
        RecordKind::Projects => dashboard.bulk_delete::<Project>(ids, confirm).await?,
        RecordKind::Certificates => dashboard.bulk_delete::<Certificate>(ids, confirm).await?,
    };
    info!(
        collection = kind.as_str(),
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "Bulk delete finished"
    );
    Ok(Json(report))
}

/// Pinning only exists for comments.
fn comments_only(kind: &str) -> Result<(), DashboardError> {
    match parse_kind(kind)? {
        RecordKind::Comments => Ok(()),
        _ => Err(DashboardError::NotFound(format!("{kind} cannot be pinned"))),
    }
}

/// POST /api/admin/comments/{id}/pin
pub async fn pin_comment(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, DashboardError> {
    comments_only(&kind)?;
    let dashboard = focus(&state, RecordKind::Comments).await;
    dashboard.pin_comment(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/admin/comments/{id}/unpin
pub async fn unpin_comment(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, DashboardError> {
    comments_only(&kind)?;
    let dashboard = focus(&state, RecordKind::Comments).await;
    dashboard.unpin_comment(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Admin routes with the login guard applied.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/view", get(get_view).patch(update_view))
        .route("/api/admin/export", get(export_view))
        .route("/api/admin/{kind}/{id}/pin", post(pin_comment))
        .route("/api/admin/{kind}/{id}/unpin", post(unpin_comment))
        .route("/api/admin/{kind}/bulk-delete", post(bulk_delete))
        .route("/api/admin/{kind}", post(create_record))
        .route(
            "/api/admin/{kind}/{id}",
            put(update_record).delete(delete_record),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::routes::auth::require_login,
        ))
}
