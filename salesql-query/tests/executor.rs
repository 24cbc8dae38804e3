//! Executor and service behaviour against a recording row store.

use std::sync::Arc;

use async_trait::async_trait;
use salesql_core::{CellValue, QueryError};
use salesql_query::{ExecutorConfig, QueryExecutor, QueryService, SqlTranslator, STAT_QUERIES};
use salesql_test_utils::assertions::{assert_execution_error, assert_unsafe_query};
use salesql_test_utils::fixtures::{local_cache, two_tier_cache};
use salesql_test_utils::generators::{arb_denylisted_keyword, arb_select_statement};
use salesql_test_utils::{MockRemoteTier, RecordingRowStore};

fn executor(store: Arc<RecordingRowStore>) -> QueryExecutor {
    QueryExecutor::new(store, local_cache(), ExecutorConfig::default())
}

#[tokio::test]
async fn test_execute_is_memoized() {
    let store = Arc::new(RecordingRowStore::with_rows(3));
    let executor = executor(store.clone());

    let first = executor.execute("SELECT n FROM t").await.unwrap();
    let second = executor.execute("SELECT n FROM t").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.call_count(), 1);

    executor.execute("SELECT n FROM t WHERE n > 0").await.unwrap();
    assert_eq!(store.call_count(), 2);
}

#[tokio::test]
async fn test_failures_propagate_and_are_not_cached() {
    let store = Arc::new(RecordingRowStore::with_rows(1));
    store.fail_on("broken");
    let executor = executor(store.clone());

    assert_execution_error(&executor.execute("SELECT broken").await, "broken");
    assert_execution_error(&executor.execute("SELECT broken").await, "broken");
    assert_eq!(store.call_count(), 2);
}

#[tokio::test]
async fn test_pagination_rewrites_statement() {
    let store = Arc::new(RecordingRowStore::with_rows(10));
    let executor = executor(store.clone());

    let page = executor
        .execute_paginated("SELECT * FROM sales", 2, 10)
        .await
        .unwrap();

    assert_eq!(store.executed(), vec!["SELECT * FROM sales\nLIMIT 10 OFFSET 10"]);
    assert_eq!(page.pagination.page, 2);
    assert_eq!(page.pagination.page_size, 10);
    assert!(page.pagination.has_more);
}

#[tokio::test]
async fn test_has_more_false_on_short_page() {
    let store = Arc::new(RecordingRowStore::with_rows(7));
    let executor = executor(store.clone());

    let page = executor
        .execute_paginated("SELECT * FROM sales", 3, 10)
        .await
        .unwrap();
    assert!(!page.pagination.has_more);
    assert_eq!(store.executed(), vec!["SELECT * FROM sales\nLIMIT 10 OFFSET 20"]);
}

#[tokio::test]
async fn test_pagination_clamps_inputs() {
    let store = Arc::new(RecordingRowStore::with_rows(0));
    let executor = executor(store.clone());

    let page = executor
        .execute_paginated("SELECT * FROM sales", 0, 5000)
        .await
        .unwrap();
    assert_eq!(page.pagination.page, 1);
    assert_eq!(page.pagination.page_size, 1000);

    let page = executor
        .execute_paginated("SELECT * FROM sales", -3, 0)
        .await
        .unwrap();
    assert_eq!(page.pagination.page, 1);
    assert_eq!(page.pagination.page_size, 1);

    assert_eq!(
        store.executed(),
        vec![
            "SELECT * FROM sales\nLIMIT 1000 OFFSET 0",
            "SELECT * FROM sales\nLIMIT 1 OFFSET 0",
        ]
    );
}

#[tokio::test]
async fn test_pagination_huge_page_does_not_overflow() {
    let store = Arc::new(RecordingRowStore::with_rows(0));
    let executor = executor(store.clone());

    let page = executor
        .execute_paginated("SELECT * FROM sales", i64::MAX, 1000)
        .await
        .unwrap();

    assert_eq!(page.pagination.page, i64::MAX);
    assert!(!page.pagination.has_more);
    assert_eq!(
        store.executed(),
        vec![format!("SELECT * FROM sales\nLIMIT 1000 OFFSET {}", i64::MAX)]
    );
}

#[tokio::test]
async fn test_stats_tolerate_partial_failure() {
    let store = Arc::new(RecordingRowStore::with_rows(1));
    store.fail_on("DISTINCT");
    let executor = executor(store.clone());

    let stats = executor.get_stats().await.unwrap();

    assert_eq!(stats.len(), STAT_QUERIES.len());
    assert_eq!(stats["unique_products"], vec![CellValue::Integer(0)]);
    assert_eq!(stats["total_records"], vec![CellValue::Integer(0)]);
    assert_eq!(store.call_count(), STAT_QUERIES.len());
}

#[tokio::test]
async fn test_stats_use_placeholder_for_empty_results() {
    let store = Arc::new(RecordingRowStore::with_rows(0));
    let executor = executor(store);

    let stats = executor.get_stats().await.unwrap();
    for (name, _) in STAT_QUERIES {
        assert_eq!(stats[*name], vec![CellValue::Integer(0)]);
    }
}

#[tokio::test]
async fn test_stats_are_memoized() {
    let store = Arc::new(RecordingRowStore::with_rows(1));
    let executor = executor(store.clone());

    let first = executor.get_stats().await.unwrap();
    let calls = store.call_count();
    let second = executor.get_stats().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.call_count(), calls);
}

#[tokio::test]
async fn test_service_rejects_before_reaching_store() {
    let store = Arc::new(RecordingRowStore::with_rows(1));
    let service = QueryService::new(store.clone(), local_cache(), ExecutorConfig::default());

    assert_unsafe_query(&service.ask("UPDATE sales SET total = 0").await);
    assert_unsafe_query(&service.ask("SELECT 1; ALTER TABLE sales ADD x").await);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_remote_outage_is_invisible_to_callers() {
    let remote = Arc::new(MockRemoteTier::new());
    let cache = two_tier_cache(remote.clone()).await;
    let store = Arc::new(RecordingRowStore::with_rows(2));
    let service = QueryService::new(store.clone(), cache, ExecutorConfig::default());

    service.ask("SELECT n FROM t").await.unwrap();
    remote.set_failing(true);

    let again = service.ask("SELECT n FROM t").await.unwrap();
    assert_eq!(again.row_count(), 2);
    assert_eq!(store.call_count(), 1);
    assert!(service.clear_cache().await);
}

#[tokio::test]
async fn test_health_reports_store_outage() {
    let store = Arc::new(RecordingRowStore::with_rows(0));
    store.set_healthy(false);
    let service = QueryService::new(store, local_cache(), ExecutorConfig::default());
    assert!(!service.health().await.database);
}

struct FixedTranslator(&'static str);

#[async_trait]
impl SqlTranslator for FixedTranslator {
    async fn translate(&self, _question: &str) -> Result<String, QueryError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn test_ask_question_returns_sql_and_data() {
    let store = Arc::new(RecordingRowStore::with_rows(1));
    let service = QueryService::new(store, local_cache(), ExecutorConfig::default())
        .with_translator(Arc::new(FixedTranslator("SELECT n FROM t")));

    let answer = service.ask_question("how many?").await.unwrap();
    assert_eq!(answer.sql, "SELECT n FROM t");
    assert_eq!(answer.data.rows, vec![vec![CellValue::Integer(0)]]);
}

#[tokio::test]
async fn test_translated_sql_passes_the_gate() {
    let store = Arc::new(RecordingRowStore::with_rows(1));
    let service = QueryService::new(store.clone(), local_cache(), ExecutorConfig::default())
        .with_translator(Arc::new(FixedTranslator("DELETE FROM sales")));

    assert_unsafe_query(&service.ask_question("remove everything").await);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_ask_question_without_translator() {
    let store = Arc::new(RecordingRowStore::with_rows(1));
    let service = QueryService::new(store, local_cache(), ExecutorConfig::default());

    assert!(matches!(
        service.ask_question("anything").await,
        Err(QueryError::Translation { .. })
    ));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Generated plain SELECTs always pass the gate.
        #[test]
        fn prop_generated_selects_are_safe(sql in arb_select_statement()) {
            prop_assert!(salesql_query::is_safe(&sql));
        }

        /// A denylisted keyword anywhere after the SELECT is refused, in any case.
        #[test]
        fn prop_denylisted_keyword_is_refused(
            sql in arb_select_statement(),
            keyword in arb_denylisted_keyword(),
        ) {
            let statement = format!("{}; {} sales", sql, keyword);
            prop_assert!(!salesql_query::is_safe(&statement));
        }
    }
}
