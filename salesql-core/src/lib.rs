//! salesql Core - Result Types and Errors
//!
//! Plain data shared by every other crate: the columnar query result, its
//! pagination metadata and the error taxonomy. No I/O lives here.

pub mod error;
pub mod types;

pub use error::{CacheError, CacheResult, ConfigError, QueryError, SalesqlError, SalesqlResult};
pub use types::{
    Answer, CellValue, DatasetStats, PaginatedResult, PaginationMeta, QueryResult, MAX_PAGE_SIZE,
};
