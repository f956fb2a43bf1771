//! services/tracker/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the key-value storage lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// Process-local storage, gone when the process exits.
    Memory,
    /// A SQLite database URL.
    Sqlite(String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub storage: StorageLocation,
    pub api_base_url: String,
    pub log_level: Level,
    pub auth_delay: Duration,
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://scrap_tracker.db?mode=rwc";
pub const DEFAULT_API_BASE_URL: &str = "https://xas-metal.onrender.com/api";

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Storage ---
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let storage = match database_url.trim() {
            "" => {
                return Err(ConfigError::InvalidValue(
                    "DATABASE_URL".to_string(),
                    "must not be empty".to_string(),
                ))
            }
            "memory" => StorageLocation::Memory,
            url if url.starts_with("sqlite:") => StorageLocation::Sqlite(url.to_string()),
            other => {
                return Err(ConfigError::InvalidValue(
                    "DATABASE_URL".to_string(),
                    format!("'{}' is neither 'memory' nor a sqlite: URL", other),
                ))
            }
        };

        // --- Remote API ---
        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Simulated authentication latency ---
        let auth_delay = match lookup("AUTH_DELAY_MS") {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|e| {
                ConfigError::InvalidValue("AUTH_DELAY_MS".to_string(), e.to_string())
            })?,
            None => Duration::ZERO,
        };

        Ok(Self {
            storage,
            api_base_url,
            log_level,
            auth_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(
            config.storage,
            StorageLocation::Sqlite(DEFAULT_DATABASE_URL.to_string())
        );
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.log_level, Level::WARN);
        assert_eq!(config.auth_delay, Duration::ZERO);
    }

    #[test]
    fn memory_storage_and_trailing_slash() {
        let config = load(&[
            ("DATABASE_URL", "memory"),
            ("API_BASE_URL", "http://localhost:5000/api/"),
            ("AUTH_DELAY_MS", "1000"),
        ])
        .unwrap();
        assert_eq!(config.storage, StorageLocation::Memory);
        assert_eq!(config.api_base_url, "http://localhost:5000/api");
        assert_eq!(config.auth_delay, Duration::from_millis(1000));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "RUST_LOG"
        ));
        assert!(matches!(
            load(&[("AUTH_DELAY_MS", "soon")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "AUTH_DELAY_MS"
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "postgres://db")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "DATABASE_URL"
        ));
        assert!(matches!(
            load(&[("API_BASE_URL", "ftp://example.com")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "API_BASE_URL"
        ));
    }
}
