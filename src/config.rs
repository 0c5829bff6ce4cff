//! Environment-driven application configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::DbConfig;
use crate::error::StartupError;
use crate::logging::config::LoggingConfig;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CREDENTIALS_PATH: &str = "public/pw.json";
pub const DEFAULT_LOCAL_STATE_PATH: &str = "data/local_state.json";
pub const DEFAULT_VIEW_SETTLE_MS: u64 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub store_backend: StoreBackend,
    pub credentials_path: PathBuf,
    pub local_state_path: PathBuf,
    /// JSON seed imported into the in-memory store at startup.
    pub seed_path: Option<PathBuf>,
    /// How long a view request waits for its first snapshot.
    pub view_settle: Duration,
    pub logging: LoggingConfig,
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>, fallback: T) -> Result<T, StartupError> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| StartupError::Config(format!("{key}={raw} is not valid"))),
        None => Ok(fallback),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
        let store_backend = match lookup("STORE_BACKEND").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.parse().map_err(StartupError::Config)?,
            None if lookup("DATABASE_URL").is_some() => StoreBackend::Postgres,
            None => StoreBackend::Memory,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var("PORT", lookup("PORT"), DEFAULT_PORT)?,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            store_backend,
            credentials_path: lookup("CREDENTIALS_PATH")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string())
                .into(),
            local_state_path: lookup("LOCAL_STATE_PATH")
                .unwrap_or_else(|| DEFAULT_LOCAL_STATE_PATH.to_string())
                .into(),
            seed_path: lookup("SEED_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            view_settle: Duration::from_millis(parse_var(
                "VIEW_SETTLE_MS",
                lookup("VIEW_SETTLE_MS"),
                DEFAULT_VIEW_SETTLE_MS,
            )?),
            logging: LoggingConfig::from_lookup(&lookup),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, StartupError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| StartupError::Config(format!("invalid HOST/PORT {}:{}", self.host, self.port)))
    }

    /// Pool settings for the Postgres backend, read from the same
    /// environment as [`DbConfig::default`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            environment: "development".to_string(),
            store_backend: StoreBackend::Memory,
            credentials_path: DEFAULT_CREDENTIALS_PATH.into(),
            local_state_path: DEFAULT_LOCAL_STATE_PATH.into(),
            seed_path: None,
            view_settle: Duration::from_millis(DEFAULT_VIEW_SETTLE_MS),
            logging: LoggingConfig::default(),
        }
    }
}
