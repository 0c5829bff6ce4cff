//! Static-credential login gate.
//!
//! The account (`{username, password, fullName, email}`) is read once from a
//! JSON file at startup. A successful login sets the persisted `isLoggedIn`
//! flag; every admin route checks that flag.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::local_state::{Language, LocalStateStore};

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .finish()
    }
}

impl Credentials {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        serde_json::from_str(&raw).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn profile(&self) -> AdminProfile {
        AdminProfile {
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Account details safe to return to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub username: String,
    pub full_name: String,
    pub email: String,
}

pub struct LoginGate {
    credentials: Result<Credentials, String>,
    local_state: Arc<LocalStateStore>,
}

impl LoginGate {
    /// Reads the credential file. A missing or malformed file is not fatal:
    /// every login attempt then fails with `CredentialsUnavailable`.
    pub fn load(path: &Path, local_state: Arc<LocalStateStore>) -> Self {
        let credentials = Credentials::from_file(path);
        match &credentials {
            Ok(c) => info!(username = %c.username, "Admin credentials loaded"),
            Err(e) => warn!("Admin credentials unavailable: {}", e),
        }
        Self {
            credentials,
            local_state,
        }
    }

    pub fn with_credentials(credentials: Credentials, local_state: Arc<LocalStateStore>) -> Self {
        Self {
            credentials: Ok(credentials),
            local_state,
        }
    }

    pub fn local_state(&self) -> &Arc<LocalStateStore> {
        &self.local_state
    }

    /// Exact match against the loaded pair.
    pub fn login(&self, username: &str, password: &str) -> DashboardResult<AdminProfile> {
        let credentials = self
            .credentials
            .as_ref()
            .map_err(|e| DashboardError::CredentialsUnavailable(e.clone()))?;

        if username != credentials.username || password != credentials.password {
            warn!(username = %username, "Login rejected");
            return Err(DashboardError::InvalidCredentials);
        }

        self.local_state.set_logged_in(true)?;
        info!(username = %username, "Admin logged in");
        Ok(credentials.profile())
    }

    pub fn logout(&self) -> DashboardResult<()> {
        self.local_state.set_logged_in(false)?;
        info!("Admin logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.local_state.is_logged_in()
    }

    pub fn require_login(&self) -> DashboardResult<()> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(DashboardError::NotLoggedIn)
        }
    }

    pub fn profile(&self) -> Option<AdminProfile> {
        self.credentials.as_ref().ok().map(Credentials::profile)
    }
}

/// Login failure text in the dashboard's language.
pub fn login_failure_message(err: &DashboardError, language: Language) -> String {
    match (err, language) {
        (DashboardError::InvalidCredentials, Language::Id) => {
            "Username atau password salah!".to_string()
        }
        (DashboardError::CredentialsUnavailable(_), Language::Id) => {
            "Data akun belum dimuat!".to_string()
        }
        (DashboardError::CredentialsUnavailable(_), Language::En) => {
            "Account data not loaded!".to_string()
        }
        _ => err.to_string(),
    }
}
