//! salesql Query - Safety-Gated Cached SQL Execution
//!
//! Runs caller-supplied SQL against the sales dataset:
//!
//! ```text
//! sql ──► SqlSafetyValidator ──► QueryExecutor ──► CacheService (hit) ──► result
//!                                      │
//!                                      └──► RowStore (miss, then cached)
//! ```
//!
//! [`QueryService`] is the entry point; the pieces are public for callers
//! that want to compose them differently.

pub mod config;
pub mod executor;
pub mod row_store;
pub mod safety;
pub mod service;
pub mod telemetry;

pub use config::{DbConfig, ExecutorConfig, SalesqlConfig};
pub use executor::{paginate_sql, QueryExecutor, QUERY_NAMESPACE, STATS_NAMESPACE, STAT_QUERIES};
pub use row_store::{RowStore, SaleRecord, SqliteRowStore};
pub use safety::{is_safe, Rejection, SafetyVerdict, SqlSafetyValidator, DENYLIST};
pub use service::{HealthReport, QueryService, SqlTranslator};
pub use telemetry::{init_tracing, TelemetryConfig};
