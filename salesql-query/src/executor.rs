//! Memoized statement execution.
//!
//! Statements reaching the executor are assumed to have passed the safety
//! gate already; [`QueryService`](crate::QueryService) is the place that
//! enforces it.

use std::sync::Arc;
use std::time::Instant;

use salesql_cache::CacheService;
use salesql_core::{
    CellValue, DatasetStats, PaginatedResult, PaginationMeta, QueryError, QueryResult,
};
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::row_store::RowStore;

/// Cache namespace for statement results.
pub const QUERY_NAMESPACE: &str = "sql_query";
/// Cache namespace for dataset statistics.
pub const STATS_NAMESPACE: &str = "stats";

/// Aggregates reported by [`QueryExecutor::get_stats`], by name.
pub const STAT_QUERIES: &[(&str, &str)] = &[
    ("total_records", "SELECT COUNT(*) FROM sales"),
    ("total_sales", "SELECT SUM(total) FROM sales"),
    ("unique_products", "SELECT COUNT(DISTINCT product_name) FROM sales"),
    ("date_range", "SELECT MIN(date), MAX(date) FROM sales"),
];

/// Value recorded for a statistic whose query failed.
fn stat_placeholder() -> Vec<CellValue> {
    vec![CellValue::Integer(0)]
}

/// Append a `LIMIT`/`OFFSET` clause for `page` of `page_size` rows.
///
/// Expects already-clamped values. A trailing semicolon is dropped so the
/// clause lands inside the statement, and the clause starts on its own line
/// so a trailing `--` comment cannot swallow it.
pub fn paginate_sql(sql: &str, page: i64, page_size: i64) -> String {
    let base = sql.trim_end().trim_end_matches(';').trim_end();
    format!(
        "{}\nLIMIT {} OFFSET {}",
        base,
        page_size,
        PaginationMeta::offset(page, page_size)
    )
}

/// Runs statements through the cache and the row store.
pub struct QueryExecutor {
    store: Arc<dyn RowStore>,
    cache: Arc<CacheService>,
    config: ExecutorConfig,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn RowStore>, cache: Arc<CacheService>, config: ExecutorConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `sql`, serving from the cache when a fresh result exists.
    ///
    /// Failures are returned unchanged and never cached.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let store = Arc::clone(&self.store);
        self.cache
            .memoize(
                QUERY_NAMESPACE,
                "execute",
                &[sql],
                self.config.query_ttl,
                move || async move {
                    let started = Instant::now();
                    let result = store.execute(sql).await?;
                    debug!(
                        rows = result.row_count(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Executed statement"
                    );
                    Ok::<_, QueryError>(result)
                },
            )
            .await
    }

    /// Execute one page of `sql`.
    ///
    /// `page` is raised to at least 1 and `page_size` clamped to
    /// `1..=max_page_size`. `has_more` is true whenever the page came back
    /// full, including a full last page.
    pub async fn execute_paginated(
        &self,
        sql: &str,
        page: i64,
        page_size: i64,
    ) -> Result<PaginatedResult, QueryError> {
        let (page, page_size) = PaginationMeta::clamp(page, page_size);
        let page_size = page_size.min(self.config.max_page_size);

        let result = self.execute(&paginate_sql(sql, page, page_size)).await?;
        let has_more = result.row_count() as i64 == page_size;

        Ok(PaginatedResult {
            result,
            pagination: PaginationMeta {
                page,
                page_size,
                has_more,
            },
        })
    }

    /// Aggregate statistics over the sales dataset.
    ///
    /// Each statistic maps to the values of its query's first row. A
    /// statistic whose query fails is reported as `[0]` and the rest are
    /// still computed, so this never fails on account of a single query.
    pub async fn get_stats(&self) -> Result<DatasetStats, QueryError> {
        self.cache
            .memoize(
                STATS_NAMESPACE,
                "get_stats",
                &(),
                self.config.stats_ttl,
                || self.compute_stats(),
            )
            .await
    }

    async fn compute_stats(&self) -> Result<DatasetStats, QueryError> {
        let mut stats = DatasetStats::new();
        for (name, sql) in STAT_QUERIES {
            let values = match self.execute(sql).await {
                Ok(result) => result
                    .first_row()
                    .map(<[CellValue]>::to_vec)
                    .unwrap_or_else(stat_placeholder),
                Err(e) => {
                    warn!(statistic = *name, error = %e, "Statistic query failed, using placeholder");
                    stat_placeholder()
                }
            };
            stats.insert(name.to_string(), values);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_sql() {
        assert_eq!(
            paginate_sql("SELECT * FROM sales", 2, 10),
            "SELECT * FROM sales\nLIMIT 10 OFFSET 10"
        );
        assert_eq!(
            paginate_sql("SELECT * FROM sales", 1, 25),
            "SELECT * FROM sales\nLIMIT 25 OFFSET 0"
        );
    }

    #[test]
    fn test_paginate_sql_strips_trailing_semicolon() {
        assert_eq!(
            paginate_sql("SELECT * FROM sales ;  ", 3, 5),
            "SELECT * FROM sales\nLIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn test_paginate_sql_survives_line_comment() {
        assert_eq!(
            paginate_sql("SELECT * FROM sales -- every row", 1, 5),
            "SELECT * FROM sales -- every row\nLIMIT 5 OFFSET 0"
        );
    }

    #[test]
    fn test_paginate_sql_saturates_offset() {
        assert_eq!(
            paginate_sql("SELECT * FROM sales", i64::MAX, 1000),
            format!("SELECT * FROM sales\nLIMIT 1000 OFFSET {}", i64::MAX)
        );
    }

    #[test]
    fn test_stat_queries_are_selects() {
        let validator = crate::safety::SqlSafetyValidator::new();
        for (name, sql) in STAT_QUERIES {
            assert!(validator.is_safe(sql), "stat {} must pass the gate", name);
        }
    }
}
