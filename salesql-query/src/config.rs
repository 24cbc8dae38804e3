//! Row store and executor configuration.

use std::path::PathBuf;
use std::time::Duration;

use salesql_cache::CacheConfig;
use salesql_core::{ConfigError, MAX_PAGE_SIZE};

use crate::telemetry::TelemetryConfig;

/// SQLite row store configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database file. `:memory:` opens a private in-memory database.
    pub path: PathBuf,
    /// How long a statement waits for the shared connection.
    pub acquire_timeout: Duration,
    /// SQLite busy handler timeout for file locks held by other processes.
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data.db"),
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create DbConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SALESQL_DB_PATH`: database file (default: `./data.db`)
    /// - `SALESQL_DB_ACQUIRE_TIMEOUT_SECS`: connection wait bound (default: 30)
    /// - `SALESQL_DB_BUSY_TIMEOUT_SECS`: SQLite busy timeout (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: std::env::var("SALESQL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            acquire_timeout: std::env::var("SALESQL_DB_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
            busy_timeout: std::env::var("SALESQL_DB_BUSY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.busy_timeout),
        }
    }

    /// An in-memory database, mostly for tests.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "SALESQL_DB_PATH".to_string(),
            });
        }
        Ok(())
    }
}

/// Cache lifetimes and paging limits used by the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// TTL for memoized statement results.
    pub query_ttl: Duration,
    /// TTL for memoized dataset statistics.
    pub stats_ttl: Duration,
    /// Upper bound applied to requested page sizes.
    pub max_page_size: i64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            query_ttl: Duration::from_secs(300),
            stats_ttl: Duration::from_secs(600),
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl ExecutorConfig {
    /// Create ExecutorConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SALESQL_QUERY_TTL_SECS` (default: 300)
    /// - `SALESQL_STATS_TTL_SECS` (default: 600)
    /// - `SALESQL_MAX_PAGE_SIZE` (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            query_ttl: std::env::var("SALESQL_QUERY_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.query_ttl),
            stats_ttl: std::env::var("SALESQL_STATS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.stats_ttl),
            max_page_size: std::env::var("SALESQL_MAX_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_page_size),
        }
    }

    pub fn with_query_ttl(mut self, ttl: Duration) -> Self {
        self.query_ttl = ttl;
        self
    }

    pub fn with_stats_ttl(mut self, ttl: Duration) -> Self {
        self.stats_ttl = ttl;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.max_page_size) {
            return Err(ConfigError::InvalidValue {
                field: "max_page_size".to_string(),
                value: self.max_page_size.to_string(),
                reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }
        if self.query_ttl.is_zero() || self.stats_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}/{:?}", self.query_ttl, self.stats_ttl),
                reason: "cache TTLs must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything the binary needs, loaded together.
#[derive(Debug, Clone, Default)]
pub struct SalesqlConfig {
    pub db: DbConfig,
    pub cache: CacheConfig,
    pub executor: ExecutorConfig,
    pub telemetry: TelemetryConfig,
}

impl SalesqlConfig {
    pub fn from_env() -> Self {
        Self {
            db: DbConfig::from_env(),
            cache: CacheConfig::from_env(),
            executor: ExecutorConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.db.validate()?;
        self.cache.validate()?;
        self.executor.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.path, PathBuf::from("./data.db"));
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[test]
    fn test_db_config_rejects_empty_path() {
        let config = DbConfig::default().with_path("");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_executor_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.query_ttl, Duration::from_secs(300));
        assert_eq!(config.stats_ttl, Duration::from_secs(600));
        assert_eq!(config.max_page_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_executor_config_rejects_page_size_out_of_range() {
        let mut config = ExecutorConfig::default();
        config.max_page_size = 5000;
        assert!(config.validate().is_err());
        config.max_page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_salesql_config_default_is_valid() {
        assert!(SalesqlConfig::default().validate().is_ok());
    }
}
