//! Tracing subscriber setup.
//!
//! Logs go to stderr so the binary's JSON output on stdout stays clean.

use salesql_core::ConfigError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "salesql_query=info,salesql_cache=info,warn";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_FILTER.to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `SALESQL_LOG`: fallback filter directives
    /// - `SALESQL_LOG_JSON`: `true`/`1` for JSON output
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("SALESQL_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
            json_logs: std::env::var("SALESQL_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. `RUST_LOG` takes precedence over
/// [`TelemetryConfig::log_filter`].
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), ConfigError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter).map_err(|e| ConfigError::InvalidValue {
            field: "SALESQL_LOG".to_string(),
            value: config.log_filter.clone(),
            reason: e.to_string(),
        })?,
    };

    let json_layer = config
        .json_logs
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!config.json_logs).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ConfigError::InvalidValue {
            field: "tracing".to_string(),
            value: "global subscriber".to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(json = config.json_logs, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_filter, DEFAULT_FILTER);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
