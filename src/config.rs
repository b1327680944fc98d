//! Shell configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use app_state::{QueryClientConfig, QueryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage::CacheConfig;

use crate::Result;

/// Query client defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    /// Seconds until cached data is considered stale
    pub stale_time_secs: u64,
    /// Seconds cached data is kept
    pub cache_time_secs: u64,
    /// Retries after a failed fetch
    pub retry_count: u32,
    /// Maximum cached queries
    pub max_entries: usize,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            stale_time_secs: 5 * 60,
            cache_time_secs: 10 * 60,
            retry_count: 1,
            max_entries: 1000,
        }
    }
}

impl QueryDefaults {
    /// Build the query client configuration
    pub fn client_config(&self) -> QueryClientConfig {
        let cache_time = Duration::from_secs(self.cache_time_secs);
        QueryClientConfig::new()
            .cache(
                CacheConfig::new()
                    .max_entries(self.max_entries)
                    .default_ttl(Some(cache_time)),
            )
            .default_options(QueryConfig {
                stale_time: Duration::from_secs(self.stale_time_secs),
                cache_time,
                retry: self.retry_count > 0,
                retry_count: self.retry_count,
                ..QueryConfig::default()
            })
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// Shell configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Where the guard sends unauthenticated users
    pub login_path: String,
    /// First entry of the history
    pub initial_path: String,
    /// Consecutive redirects tolerated in one render
    pub max_redirects: usize,
    /// Persist the auth state here when set
    pub auth_state_path: Option<PathBuf>,
    /// Query client defaults
    pub query: QueryDefaults,
    /// Logging
    pub log: LogConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            login_path: app_ui::DEFAULT_LOGIN_PATH.to_string(),
            initial_path: "/".to_string(),
            max_redirects: 8,
            auth_state_path: None,
            query: QueryDefaults::default(),
            log: LogConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Set the login path
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Set the initial path
    pub fn initial_path(mut self, path: impl Into<String>) -> Self {
        self.initial_path = path.into();
        self
    }

    /// Set the redirect limit
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Persist auth state at `path`
    pub fn auth_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_state_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShellError;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::default();

        assert_eq!(config.login_path, "/login");
        assert_eq!(config.initial_path, "/");
        assert_eq!(config.max_redirects, 8);
        assert!(config.auth_state_path.is_none());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ShellConfig::from_json(
            r#"{ "login_path": "/signin", "query": { "retry_count": 0 } }"#,
        )
        .unwrap();

        assert_eq!(config.login_path, "/signin");
        assert_eq!(config.max_redirects, 8);
        assert_eq!(config.query.retry_count, 0);
        assert_eq!(config.query.stale_time_secs, 300);
    }

    #[test]
    fn test_invalid_json() {
        let result = ShellConfig::from_json("{ nope");
        assert!(matches!(result, Err(ShellError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ShellConfig::from_file("/definitely/not/here.json");
        assert!(matches!(result, Err(ShellError::Io(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("shell.json");
        std::fs::write(&path, r#"{ "initial_path": "/home", "log": { "json": true } }"#).unwrap();

        let config = ShellConfig::from_file(&path).unwrap();
        assert_eq!(config.initial_path, "/home");
        assert!(config.log.json);
    }

    #[test]
    fn test_client_config() {
        let defaults = QueryDefaults { retry_count: 0, ..QueryDefaults::default() };
        let client = defaults.client_config();

        assert!(!client.default_options.retry);
        assert_eq!(client.default_options.stale_time, Duration::from_secs(300));
        assert_eq!(client.cache.max_entries, 1000);
    }

    #[test]
    fn test_builder() {
        let config = ShellConfig::new()
            .login_path("/auth")
            .initial_path("/start")
            .max_redirects(2)
            .auth_state_path("/tmp/auth.json");

        assert_eq!(config.login_path, "/auth");
        assert_eq!(config.initial_path, "/start");
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.auth_state_path, Some(PathBuf::from("/tmp/auth.json")));
    }
}
