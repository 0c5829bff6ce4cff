/**
 * Authentication Routes
 * Static-credential login, logout and session status, plus the guard that
 * keeps admin routes behind the persisted login flag
 */
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{login_failure_message, AdminProfile};
use crate::error::DashboardError;
use crate::routes::{ErrorResponse, SuccessResponse};
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AdminProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AdminProfile>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    if payload.username.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse {
                success: false,
                user: None,
                error: Some("Username and password are required".to_string()),
            }),
        );
    }

    match state.gate.login(&payload.username, &payload.password) {
        Ok(user) => (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                user: Some(user),
                error: None,
            }),
        ),
        Err(err) => {
            let language = state.local_state.settings().language;
            let status = crate::routes::status_for(&err);
            (
                status,
                Json(LoginResponse {
                    success: false,
                    user: None,
                    error: Some(login_failure_message(&err, language)),
                }),
            )
        }
    }
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>) -> Result<Json<SuccessResponse>, DashboardError> {
    state.gate.logout()?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/auth/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let is_logged_in = state.gate.is_logged_in();
    Json(StatusResponse {
        is_logged_in,
        user: if is_logged_in {
            state.gate.profile()
        } else {
            None
        },
    })
}

/// Rejects admin requests while the login flag is clear.
pub async fn require_login(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.gate.require_login() {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::debug!(uri = %request.uri(), "Admin request without login");
            (StatusCode::UNAUTHORIZED, Json(ErrorResponse::from(&err))).into_response()
        }
    }
}
