//! Portfolio Dashboard - live-synced portfolio backend and admin dashboard

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod export;
pub mod form;
pub mod local_state;
pub mod logging;
pub mod models;
pub mod mutations;
pub mod projector;
pub mod public;
pub mod routes;
pub mod seed;
pub mod store;
pub mod sync;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
    limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::auth::LoginGate;
use crate::config::{AppConfig, StoreBackend};
use crate::dashboard::AdminDashboard;
use crate::error::StartupError;
use crate::local_state::LocalStateStore;
use crate::public::PublicSite;
use crate::store::memory::InMemoryStore;
use crate::store::DocumentStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub gate: Arc<LoginGate>,
    pub local_state: Arc<LocalStateStore>,
    pub admin: Arc<RwLock<AdminDashboard>>,
    pub public: Arc<PublicSite>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>, gate: LoginGate) -> Self {
        Self {
            config: Arc::new(config),
            local_state: gate.local_state().clone(),
            gate: Arc::new(gate),
            admin: Arc::new(RwLock::new(AdminDashboard::new(store.clone()))),
            public: Arc::new(PublicSite::new(store.clone())),
            store,
        }
    }
}

fn default_origins() -> Vec<HeaderValue> {
    vec![
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ]
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN, falling back
/// to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect::<Vec<HeaderValue>>()
        })
        .filter(|origins| !origins.is_empty())
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(default_origins);

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    Router::new()
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/status", get(routes::auth::status))
        .route(
            "/api/settings",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .route(
            "/api/comments",
            get(routes::public::list_comments).post(routes::public::post_comment),
        )
        .route("/api/contacts", post(routes::public::send_contact))
        .route("/api/projects", get(routes::public::list_projects))
        .route("/api/projects/{id}", get(routes::public::get_project))
        .route("/api/certificates", get(routes::public::list_certificates))
        .merge(routes::admin::router(state.clone()))
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/store", get(routes::health::health_store))
        .route("/health/ready", get(routes::health::health_ready))
        .with_state(state)
        .layer(CatchPanicLayer::custom(logging::middleware::panic_response))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
}

/// Opens the configured backend. Postgres runs migrations first; the
/// in-memory store imports the seed file when one is configured.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>, StartupError> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = db::init_pool(Some(config.db_config())).await?;
            db::run_migrations(&pool).await?;
            Ok(Arc::new(db::PgDocumentStore::new(pool)))
        }
        StoreBackend::Memory => {
            let store = InMemoryStore::new();
            if let Some(path) = &config.seed_path {
                let seed = seed::SeedData::from_file(path)?;
                seed::import(&store, seed).await;
            } else {
                tracing::info!("No SEED_PATH set. Starting with an empty in-memory store.");
            }
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Held for the process lifetime so buffered log lines are flushed.
    let _log_guards = logging::init(&config.logging);

    routes::health::init_start_time();

    let store = open_store(&config).await?;
    tracing::info!(backend = store.backend_name(), "Document store ready");

    let local_state = Arc::new(LocalStateStore::load(&config.local_state_path));
    let gate = LoginGate::load(&config.credentials_path, local_state);

    let addr: SocketAddr = config.bind_addr()?;
    let state = AppState::new(config, store, gate);
    state.public.mount().await;

    let app = create_app(state.clone());

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.public.unmount();
    state.admin.write().await.deactivate();
    tracing::info!("Server stopped");
    Ok(())
}
