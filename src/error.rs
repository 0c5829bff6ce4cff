//! Error taxonomy shared by the store layer, the controllers and the HTTP handlers.

use thiserror::Error;

use crate::models::{RecordKind, ValidationErrors};

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore).
///
/// Every variant carries the store's own message so it can be shown to the
/// user verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Serialization(String),

    #[error("{0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(value.to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the dashboard controllers and the login gate.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Deletion was not confirmed")]
    NotConfirmed,

    #[error("{} cannot be modified from the dashboard", .0.label())]
    ReadOnly(RecordKind),

    #[error("Another {0} is already in progress")]
    Busy(&'static str),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("No form is open")]
    FormClosed,

    #[error("No dashboard tab is selected")]
    NoActiveTab,

    #[error("Invalid request body: {0}")]
    InvalidPayload(String),

    #[error("Login required")]
    NotLoggedIn,

    #[error("Incorrect username or password!")]
    InvalidCredentials,

    #[error("Account data not loaded: {0}")]
    CredentialsUnavailable(String),

    #[error("Failed to persist local state: {0}")]
    State(String),
}

impl DashboardError {
    /// True for errors produced by the remote store rather than by local checks.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;

/// Errors that stop the server or a tool from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Seed import failed: {0}")]
    Seed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
