//! Process-wide persisted state: the login flag and dashboard settings.
//!
//! Read once at startup (defaults when the file is absent) and written only by
//! the login/logout and settings handlers. A change is persisted before it is
//! committed in memory, so a failed write leaves the previous state in place.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DashboardError, DashboardResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Id,
    En,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub language: Language,
}

/// Partial settings update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub language: Option<Language>,
}

impl DashboardSettings {
    pub fn apply(mut self, patch: &SettingsPatch) -> Self {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default)]
    pub dashboard_settings: DashboardSettings,
}

pub struct LocalStateStore {
    path: Option<PathBuf>,
    state: RwLock<LocalState>,
}

impl LocalStateStore {
    /// Loads the state file, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Ignoring malformed local state: {}", e);
                LocalState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalState::default(),
            Err(e) => {
                warn!(path = %path.display(), "Failed to read local state: {}", e);
                LocalState::default()
            }
        };
        info!(
            path = %path.display(),
            logged_in = state.is_logged_in,
            "Local state loaded"
        );
        Self {
            path: Some(path),
            state: RwLock::new(state),
        }
    }

    /// Non-persistent state, used by tests.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(LocalState::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, LocalState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> LocalState {
        self.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.read().is_logged_in
    }

    pub fn settings(&self) -> DashboardSettings {
        self.read().dashboard_settings
    }

    fn persist(&self, state: &LocalState) -> DashboardResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DashboardError::State(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| DashboardError::State(e.to_string()))?;
        std::fs::write(path, raw).map_err(|e| DashboardError::State(e.to_string()))
    }

    fn update(&self, f: impl FnOnce(&mut LocalState)) -> DashboardResult<LocalState> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        f(&mut next);
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn set_logged_in(&self, logged_in: bool) -> DashboardResult<()> {
        self.update(|s| s.is_logged_in = logged_in)?;
        info!(logged_in, "Login flag updated");
        Ok(())
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> DashboardResult<DashboardSettings> {
        let next = self.update(|s| s.dashboard_settings = s.dashboard_settings.apply(patch))?;
        Ok(next.dashboard_settings)
    }
}
