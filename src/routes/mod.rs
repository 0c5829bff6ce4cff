/**
 * Routes Module
 * API route handlers and the error-to-response mapping they share
 */

pub mod admin;
pub mod auth;
pub mod health;
pub mod public;
pub mod settings;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::DashboardError;
use crate::models::ValidationErrors;

/// Path the client is sent to when a session is missing.
pub const LOGIN_REDIRECT: &str = "/login";

// ============================================================================
// Response Types
// ============================================================================

/// Error body returned by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

impl ErrorResponse {
    pub fn new(code: &'static str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code,
            fields: None,
            redirect: None,
        }
    }
}

/// `{ id }` body for a created record.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ============================================================================
// Error Mapping
// ============================================================================

pub fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::Validation(_) | DashboardError::InvalidPayload(_) => {
            StatusCode::BAD_REQUEST
        }
        DashboardError::NotLoggedIn | DashboardError::InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
        DashboardError::Busy(_) | DashboardError::FormClosed | DashboardError::NoActiveTab => {
            StatusCode::CONFLICT
        }
        DashboardError::NotConfirmed => StatusCode::PRECONDITION_REQUIRED,
        DashboardError::ReadOnly(_) => StatusCode::METHOD_NOT_ALLOWED,
        DashboardError::Store(_) => StatusCode::BAD_GATEWAY,
        DashboardError::CredentialsUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DashboardError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn code_for(err: &DashboardError) -> &'static str {
    match err {
        DashboardError::Validation(_) => "validation_failed",
        DashboardError::InvalidPayload(_) => "invalid_payload",
        DashboardError::Store(_) => "store_error",
        DashboardError::NotConfirmed => "confirmation_required",
        DashboardError::ReadOnly(_) => "read_only",
        DashboardError::Busy(_) => "busy",
        DashboardError::NotFound(_) => "not_found",
        DashboardError::FormClosed => "form_closed",
        DashboardError::NoActiveTab => "no_active_tab",
        DashboardError::NotLoggedIn => "not_logged_in",
        DashboardError::InvalidCredentials => "invalid_credentials",
        DashboardError::CredentialsUnavailable(_) => "credentials_unavailable",
        DashboardError::State(_) => "state_error",
    }
}

impl From<&DashboardError> for ErrorResponse {
    fn from(err: &DashboardError) -> Self {
        let mut body = ErrorResponse::new(code_for(err), err.to_string());
        match err {
            DashboardError::Validation(fields) => body.fields = Some(fields.clone()),
            DashboardError::NotLoggedIn => body.redirect = Some(LOGIN_REDIRECT),
            _ => {}
        }
        body
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!(status = %status, "Request failed: {}", self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

/// Turns a JSON body rejection into the dashboard's own 400 response.
pub fn parse_body<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, DashboardError> {
    serde_json::from_value(value).map_err(|e| DashboardError::InvalidPayload(e.to_string()))
}

// ============================================================================
// Test Helpers
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::{Credentials, LoginGate};
    use crate::config::AppConfig;
    use crate::local_state::LocalStateStore;
    use crate::store::memory::InMemoryStore;
    use crate::AppState;

    pub const USERNAME: &str = "admin";
    pub const PASSWORD: &str = "s3cret";

    pub fn state_with(store: InMemoryStore) -> AppState {
        let gate = LoginGate::with_credentials(
            Credentials {
                username: USERNAME.to_string(),
                password: PASSWORD.to_string(),
                full_name: "Site Owner".to_string(),
                email: "owner@example.com".to_string(),
            },
            Arc::new(LocalStateStore::in_memory()),
        );
        let config = AppConfig {
            view_settle: std::time::Duration::from_millis(500),
            ..AppConfig::default()
        };
        AppState::new(config, Arc::new(store), gate)
    }

    pub async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, bytes) = send_raw(app, method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn send_raw(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }
}
