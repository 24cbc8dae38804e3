//! Error types for salesql operations

use std::time::Duration;
use thiserror::Error;

/// Cache tier errors.
///
/// These never reach a caller of the query service: the tier store absorbs
/// them and degrades to the local tier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache tier {tier} unavailable: {reason}")]
    Unavailable { tier: String, reason: String },

    #[error("Cache tier {tier} timed out after {after:?}")]
    Timeout { tier: String, after: Duration },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Local cache lock poisoned")]
    LockPoisoned,
}

/// Query execution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Deliberately generic: the matched pattern is only logged.
    #[error("unsafe query, only SELECT allowed")]
    UnsafeQuery,

    #[error("internal error executing query: {message}")]
    Execution { message: String },

    #[error("Timed out after {waited:?} waiting for a database connection")]
    ConnectionTimeout { waited: Duration },

    #[error("Query worker failed: {reason}")]
    WorkerFailed { reason: String },

    #[error("SQL translation failed: {reason}")]
    Translation { reason: String },
}

impl QueryError {
    /// Build an execution failure from any displayable engine error.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution {
            message: err.to_string(),
        }
    }

    /// Whether a later attempt could succeed. The service never retries on
    /// its own; this is information for the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all salesql errors.
///
/// Cache tier failures never surface here: the tier store absorbs them and
/// falls back to the local tier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SalesqlError {
    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for salesql operations.
pub type SalesqlResult<T> = Result<T, SalesqlError>;

/// Result type alias for cache tier operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_query_display_is_generic() {
        let err = SalesqlError::from(QueryError::UnsafeQuery);
        assert_eq!(err.to_string(), "unsafe query, only SELECT allowed");
    }

    #[test]
    fn test_config_error_converts_into_master_error() {
        let err: SalesqlError = ConfigError::MissingRequired {
            field: "SALESQL_DB_PATH".to_string(),
        }
        .into();
        assert!(matches!(err, SalesqlError::Config(_)));
        assert!(err.to_string().contains("SALESQL_DB_PATH"));
    }

    #[test]
    fn test_execution_error_carries_message() {
        let err = QueryError::execution("no such table: salez");
        let msg = err.to_string();
        assert!(msg.contains("internal error"));
        assert!(msg.contains("no such table: salez"));
    }

    #[test]
    fn test_connection_timeout_is_retryable() {
        let err = QueryError::ConnectionTimeout {
            waited: Duration::from_secs(30),
        };
        assert!(err.is_retryable());
        assert!(!QueryError::UnsafeQuery.is_retryable());
        assert!(!QueryError::execution("boom").is_retryable());
    }

    #[test]
    fn test_cache_error_display_timeout() {
        let err = CacheError::Timeout {
            tier: "redis".to_string(),
            after: Duration::from_millis(500),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("redis"));
        assert!(msg.contains("500ms"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "SALESQL_LOCAL_CACHE_CAPACITY".to_string(),
            value: "0".to_string(),
            reason: "must be at least 2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SALESQL_LOCAL_CACHE_CAPACITY"));
        assert!(msg.contains("must be at least 2"));
    }
}
