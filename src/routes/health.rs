/**
 * Health Routes
 * Liveness, store connectivity and readiness of the live views
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::store::DocumentStore;
use crate::AppState;

// Track server start time for uptime calculation
lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Single service check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub store: ServiceCheck,
    pub public_views: String,
    pub admin_tab: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

async fn check_store(store: &dyn DocumentStore) -> ServiceCheck {
    match store.health_check().await {
        Ok(duration) => ServiceCheck {
            status: "healthy".to_string(),
            backend: Some(store.backend_name().to_string()),
            response_time: Some(duration.as_millis() as u64),
            error: None,
        },
        Err(e) => ServiceCheck {
            status: "unhealthy".to_string(),
            backend: Some(store.backend_name().to_string()),
            response_time: None,
            error: Some(e.to_string()),
        },
    }
}

/// GET /health
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/detailed
pub async fn health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    let store = check_store(state.store.as_ref()).await;
    let admin_tab = state
        .admin
        .read()
        .await
        .active_tab()
        .map(|kind| kind.to_string());

    let response = DetailedHealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime: SERVER_START.elapsed().as_secs(),
        checks: HealthChecks {
            store,
            public_views: if state.public.is_mounted() {
                "mounted".to_string()
            } else {
                "unmounted".to_string()
            },
            admin_tab,
        },
    };

    (StatusCode::OK, Json(response))
}

/// GET /health/store
pub async fn health_store(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(check_store(state.store.as_ref()).await))
}

/// GET /health/ready
/// Ready once the store answers and the public views are subscribed.
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let reason = match state.store.health_check().await {
        Err(e) => Some(format!("store unavailable: {e}")),
        Ok(_) if !state.public.is_mounted() => Some("public views not mounted".to_string()),
        Ok(_) => None,
    };

    let status = if reason.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = ReadyResponse {
        status: if reason.is_none() { "ready" } else { "not ready" }.to_string(),
        timestamp: Utc::now(),
        uptime: SERVER_START.elapsed().as_secs(),
        reason,
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::state_with;
    use crate::store::memory::InMemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_ping))
            .route("/health/detailed", get(health_detailed))
            .route("/health/store", get(health_store))
            .route("/health/ready", get(health_ready))
            .with_state(state)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(app: Router, uri: &str) -> (StatusCode, T) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value: T = serde_json::from_slice(&body).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn test_health_ping_returns_ok() {
        init_start_time();
        let app = test_router(state_with(InMemoryStore::new()));
        let (status, body) = get_json::<SimpleHealthResponse>(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_health_store_names_backend() {
        let app = test_router(state_with(InMemoryStore::new()));
        let (status, body) = get_json::<ServiceCheck>(app, "/health/store").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.backend.as_deref(), Some("memory"));
    }

    #[tokio::test]
    async fn test_ready_waits_for_public_views() {
        init_start_time();
        let state = state_with(InMemoryStore::new());
        let app = test_router(state.clone());

        let (status, body) = get_json::<ReadyResponse>(app.clone(), "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "not ready");

        state.public.mount().await;
        let (status, body) = get_json::<ReadyResponse>(app.clone(), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ready");

        let (_, detailed) = get_json::<DetailedHealthResponse>(app, "/health/detailed").await;
        assert_eq!(detailed.checks.public_views, "mounted");
        assert!(detailed.checks.admin_tab.is_none());
    }
}
