use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Where and how verbosely the server logs.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub environment: String,
    pub level: LogLevel,
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            level: LogLevel::Debug,
            directory: PathBuf::from("logs"),
        }
    }
}

impl LoggingConfig {
    /// Reads ENVIRONMENT, LOG_LEVEL and LOG_DIR. An unknown LOG_LEVEL falls
    /// back to the environment's default.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let default_level = if environment == "production" {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        Self {
            level: lookup("LOG_LEVEL")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(default_level),
            directory: lookup("LOG_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            environment,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Default `EnvFilter` directive when RUST_LOG is unset.
    pub fn filter_directive(&self) -> String {
        format!(
            "portfolio_dashboard={},tower_http=debug,axum=debug",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_defaults_follow_environment() {
        let dev = LoggingConfig::from_lookup(&|_: &str| None);
        assert_eq!(dev.level, LogLevel::Debug);
        assert!(!dev.is_production());

        let prod = LoggingConfig::from_lookup(&|key: &str| {
            (key == "ENVIRONMENT").then(|| "production".to_string())
        });
        assert_eq!(prod.level, LogLevel::Info);
        assert_eq!(
            prod.filter_directive(),
            "portfolio_dashboard=info,tower_http=debug,axum=debug"
        );
    }

    #[test]
    fn test_explicit_level_and_directory() {
        let config = LoggingConfig::from_lookup(&|key: &str| match key {
            "LOG_LEVEL" => Some("WARNING".to_string()),
            "LOG_DIR" => Some("/var/log/portfolio".to_string()),
            _ => None,
        });
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.directory, PathBuf::from("/var/log/portfolio"));
    }
}
