/**
 * Settings Routes
 * Dashboard theme and language, persisted with the login flag
 */
use axum::{extract::State, Json};

use crate::error::DashboardError;
use crate::local_state::{DashboardSettings, SettingsPatch};
use crate::AppState;

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<DashboardSettings> {
    Json(state.local_state.settings())
}

/// PUT /api/settings
/// Absent fields keep their current value.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<DashboardSettings>, DashboardError> {
    let settings = state.local_state.update_settings(&patch)?;
    tracing::info!(theme = ?settings.theme, language = ?settings.language, "Dashboard settings updated");
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{send, state_with};
    use crate::store::memory::InMemoryStore;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let app = Router::new()
            .route("/api/settings", get(get_settings).put(update_settings))
            .with_state(state_with(InMemoryStore::new()));

        let (_, body) = send(app.clone(), "GET", "/api/settings", None).await;
        assert_eq!(body, json!({"theme": "light", "language": "id"}));

        let (code, body) = send(
            app.clone(),
            "PUT",
            "/api/settings",
            Some(json!({"theme": "dark"})),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, json!({"theme": "dark", "language": "id"}));

        let (code, _) = send(
            app,
            "PUT",
            "/api/settings",
            Some(json!({"language": "fr"})),
        )
        .await;
        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
