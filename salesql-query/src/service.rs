//! Query service facade.
//!
//! The outward contract for whatever sits in front of the core (HTTP layer,
//! CLI): every statement passes the safety gate here before it reaches the
//! executor, and cache-tier trouble never turns into an error.

use std::sync::Arc;

use async_trait::async_trait;
use salesql_cache::{CacheService, CacheServiceStats};
use salesql_core::{Answer, DatasetStats, PaginatedResult, QueryError, QueryResult};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ExecutorConfig;
use crate::executor::QueryExecutor;
use crate::row_store::RowStore;
use crate::safety::SqlSafetyValidator;

/// Turns a natural-language question into SQL text.
///
/// The output is untrusted and goes through the same safety gate as any
/// other statement.
#[async_trait]
pub trait SqlTranslator: Send + Sync {
    async fn translate(&self, question: &str) -> Result<String, QueryError>;
}

/// Reachability of the row store plus a cache snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub database: bool,
    pub cache: CacheServiceStats,
}

/// Safety-gated, cached access to the sales dataset.
pub struct QueryService {
    validator: SqlSafetyValidator,
    executor: QueryExecutor,
    store: Arc<dyn RowStore>,
    cache: Arc<CacheService>,
    translator: Option<Arc<dyn SqlTranslator>>,
}

impl QueryService {
    pub fn new(store: Arc<dyn RowStore>, cache: Arc<CacheService>, config: ExecutorConfig) -> Self {
        let executor = QueryExecutor::new(Arc::clone(&store), Arc::clone(&cache), config);
        Self {
            validator: SqlSafetyValidator::new(),
            executor,
            store,
            cache,
            translator: None,
        }
    }

    /// Enable [`ask_question`](Self::ask_question).
    pub fn with_translator(mut self, translator: Arc<dyn SqlTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    /// Validate and run `sql`.
    pub async fn ask(&self, sql: &str) -> Result<QueryResult, QueryError> {
        self.validator.ensure_safe(sql)?;
        self.executor.execute(sql).await
    }

    /// Validate `sql`, then run one page of it.
    pub async fn query_paginated(
        &self,
        sql: &str,
        page: i64,
        page_size: i64,
    ) -> Result<PaginatedResult, QueryError> {
        self.validator.ensure_safe(sql)?;
        self.executor.execute_paginated(sql, page, page_size).await
    }

    /// Dataset statistics. Individual failed statistics carry placeholders.
    pub async fn stats(&self) -> Result<DatasetStats, QueryError> {
        self.executor.get_stats().await
    }

    /// Drop every cached result. Returns `true` when the local tier was cleared.
    pub async fn clear_cache(&self) -> bool {
        self.cache.clear().await
    }

    /// Translate `question` to SQL, then answer it like [`ask`](Self::ask).
    pub async fn ask_question(&self, question: &str) -> Result<Answer, QueryError> {
        let translator = self
            .translator
            .as_ref()
            .ok_or_else(|| QueryError::Translation {
                reason: "no SQL translator configured".to_string(),
            })?;

        let sql = translator.translate(question).await?;
        info!(question, sql = %sql, "Translated question");

        let data = self.ask(&sql).await?;
        Ok(Answer { sql, data })
    }

    pub async fn health(&self) -> HealthReport {
        let database = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Row store health check failed");
                false
            }
        };

        HealthReport {
            database,
            cache: self.cache.stats().await,
        }
    }
}
