//! Cache configuration.
//!
//! Loaded from environment variables with defaults suitable for a single
//! instance running without Redis.

use std::time::Duration;

use salesql_core::ConfigError;

/// Configuration for the two-tier cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL for the distributed tier. `None` means local-only.
    pub redis_url: Option<String>,
    /// Maximum number of entries held by the local tier.
    pub local_capacity: usize,
    /// Bound on the initial connection handshake to the distributed tier.
    pub connect_timeout: Duration,
    /// Bound on every individual distributed-tier call.
    pub call_timeout: Duration,
    /// How often to re-probe the distributed tier.
    pub health_check_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            local_capacity: 1000,
            connect_timeout: Duration::from_secs(2),
            call_timeout: Duration::from_millis(500),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SALESQL_REDIS_URL` (falls back to `REDIS_URL`): distributed tier URL, unset = local-only
    /// - `SALESQL_LOCAL_CACHE_CAPACITY`: local tier entry bound (default: 1000)
    /// - `SALESQL_CACHE_CONNECT_TIMEOUT_MS`: handshake bound (default: 2000)
    /// - `SALESQL_CACHE_CALL_TIMEOUT_MS`: per-call bound (default: 500)
    /// - `SALESQL_CACHE_HEALTH_CHECK_SECS`: health probe interval (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let redis_url = std::env::var("SALESQL_REDIS_URL")
            .ok()
            .or_else(|| std::env::var("REDIS_URL").ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let local_capacity = std::env::var("SALESQL_LOCAL_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.local_capacity);

        let connect_timeout = std::env::var("SALESQL_CACHE_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.connect_timeout);

        let call_timeout = std::env::var("SALESQL_CACHE_CALL_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.call_timeout);

        let health_check_interval = std::env::var("SALESQL_CACHE_HEALTH_CHECK_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.health_check_interval);

        Self {
            redis_url,
            local_capacity,
            connect_timeout,
            call_timeout,
            health_check_interval,
        }
    }

    /// Set the distributed tier URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Set the local tier capacity.
    pub fn with_local_capacity(mut self, capacity: usize) -> Self {
        self.local_capacity = capacity;
        self
    }

    /// Set the handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the health check interval.
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Reject values the tier store cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Eviction keeps half the capacity, so one slot would evict everything.
        if self.local_capacity < 2 {
            return Err(ConfigError::InvalidValue {
                field: "local_capacity".to_string(),
                value: self.local_capacity.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "call_timeout".to_string(),
                value: format!("{:?}", self.call_timeout),
                reason: "must be non-zero".to_string(),
            });
        }
        if let Some(url) = &self.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::InvalidValue {
                    field: "redis_url".to_string(),
                    value: url.clone(),
                    reason: "expected a redis:// or rediss:// URL".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.redis_url.is_none());
        assert_eq!(config.local_capacity, 1000);
        assert_eq!(config.call_timeout, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_redis_url("redis://cache:6379")
            .with_local_capacity(64)
            .with_connect_timeout(Duration::from_millis(100))
            .with_call_timeout(Duration::from_millis(50))
            .with_health_check_interval(Duration::from_secs(5));

        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.local_capacity, 64);
        assert_eq!(config.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.call_timeout, Duration::from_millis(50));
        assert_eq!(config.health_check_interval, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tiny_capacity() {
        let config = CacheConfig::new().with_local_capacity(1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "local_capacity"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = CacheConfig::new().with_redis_url("http://cache:6379");
        assert!(config.validate().is_err());
    }
}
