//! salesql Test Utilities
//!
//! Shared test infrastructure for the salesql workspace:
//! - A scriptable in-memory stand-in for the distributed cache tier
//! - A recording row store
//! - Sales fixtures and ready-made caches
//! - Proptest generators
//! - Assertions on query errors

pub use salesql_cache::{CacheService, CacheTier, LocalTier, TierStats, TierStore};
pub use salesql_core::{CacheError, CellValue, QueryError, QueryResult};
pub use salesql_query::{RowStore, SaleRecord, SqliteRowStore};

use async_trait::async_trait;
use salesql_core::CacheResult;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// MOCK DISTRIBUTED TIER
// ============================================================================

/// In-memory distributed tier with real TTL expiry and failure switches.
///
/// - `set_failing(true)`: every call returns [`CacheError::Unavailable`]
/// - `set_hanging(true)`: every call never completes
#[derive(Debug, Default)]
pub struct MockRemoteTier {
    entries: Mutex<HashMap<String, (Value, Option<Instant>)>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MockRemoteTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Number of `get` calls that reached the tier.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls that reached the tier.
    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Whether `key` is stored and not yet expired.
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().expect("mock tier lock");
        entries
            .get(key)
            .map(|(_, expires)| expires.map_or(true, |at| Instant::now() < at))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("mock tier lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn gate(&self) -> CacheResult<()> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                tier: "mock-remote".to_string(),
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheTier for MockRemoteTier {
    fn name(&self) -> &'static str {
        "mock-remote"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;

        let mut entries = self.entries.lock().map_err(|_| CacheError::LockPoisoned)?;
        match entries.get(key) {
            Some((_, Some(at))) if Instant::now() >= *at => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;

        // A TTL past the end of the clock never expires.
        let expires = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .map_err(|_| CacheError::LockPoisoned)?
            .insert(key.to_string(), (value.clone(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.gate().await?;
        self.entries
            .lock()
            .map_err(|_| CacheError::LockPoisoned)?
            .remove(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.gate().await?;
        self.entries
            .lock()
            .map_err(|_| CacheError::LockPoisoned)?
            .clear();
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.gate().await
    }

    async fn stats(&self) -> CacheResult<TierStats> {
        self.gate().await?;
        let entries = self.entries.lock().map_err(|_| CacheError::LockPoisoned)?;
        let mut passthrough = BTreeMap::new();
        passthrough.insert("connected_clients".to_string(), "1".to_string());
        Ok(TierStats {
            entry_count: Some(entries.len() as u64),
            capacity: None,
            evictions: 0,
            passthrough,
        })
    }
}

// ============================================================================
// RECORDING ROW STORE
// ============================================================================

/// Row store that records every statement and answers from a canned result.
///
/// Statements containing a substring registered with
/// [`fail_on`](Self::fail_on) fail with an execution error.
#[derive(Debug)]
pub struct RecordingRowStore {
    result: QueryResult,
    fail_patterns: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
    healthy: AtomicBool,
}

impl RecordingRowStore {
    pub fn new(result: QueryResult) -> Self {
        Self {
            result,
            fail_patterns: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// A store answering every statement with `rows` single-column rows.
    pub fn with_rows(rows: usize) -> Self {
        Self::new(fixtures::numbered_rows(rows))
    }

    pub fn fail_on(&self, pattern: impl Into<String>) {
        self.fail_patterns
            .lock()
            .expect("recording store lock")
            .push(pattern.into());
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().expect("recording store lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.executed.lock().expect("recording store lock").len()
    }
}

#[async_trait]
impl RowStore for RecordingRowStore {
    async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        self.executed
            .lock()
            .map_err(QueryError::execution)?
            .push(sql.to_string());

        let failing = self
            .fail_patterns
            .lock()
            .map_err(QueryError::execution)?
            .iter()
            .any(|pattern| sql.contains(pattern.as_str()));
        if failing {
            return Err(QueryError::execution(format!("simulated failure for: {}", sql)));
        }

        Ok(self.result.clone())
    }

    async fn ping(&self) -> Result<(), QueryError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueryError::execution("simulated outage"))
        }
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use std::sync::Arc;

    fn sale(ticket: &str, product: &str, quantity: f64, unitary_price: f64) -> SaleRecord {
        SaleRecord {
            date: "2024-03-01".to_string(),
            week_day: "Friday".to_string(),
            hour: "13:15".to_string(),
            ticket_number: ticket.to_string(),
            waiter: 3,
            product_name: product.to_string(),
            quantity,
            unitary_price,
            total: quantity * unitary_price,
        }
    }

    /// Three sales whose totals sum to 300.0.
    pub fn sample_sales() -> Vec<SaleRecord> {
        let mut records = vec![
            sale("T-100", "Espresso", 4.0, 25.0),
            sale("T-101", "Croissant", 5.0, 30.0),
            sale("T-102", "Orange Juice", 2.0, 25.0),
        ];
        records[2].date = "2024-03-02".to_string();
        records[2].week_day = "Saturday".to_string();
        records
    }

    /// In-memory SQLite store holding [`sample_sales`].
    pub async fn seeded_sales_store() -> SqliteRowStore {
        let store = SqliteRowStore::open_in_memory().expect("open in-memory store");
        store.create_schema().await.expect("create schema");
        store
            .insert_sales(&sample_sales())
            .await
            .expect("insert sample sales");
        store
    }

    /// `n` rows of a single `n` column holding 0..n.
    pub fn numbered_rows(n: usize) -> QueryResult {
        QueryResult::new(
            vec!["n".to_string()],
            (0..n as i64).map(|i| vec![CellValue::Integer(i)]).collect(),
        )
    }

    /// A local-only cache service.
    pub fn local_cache() -> Arc<CacheService> {
        Arc::new(CacheService::local_only(1000))
    }

    /// A two-tier cache over `remote`, already initialized.
    pub async fn two_tier_cache(remote: Arc<MockRemoteTier>) -> Arc<CacheService> {
        let store = two_tier_store(remote, Duration::from_millis(200));
        let cache = CacheService::new(store);
        cache.initialize().await;
        Arc::new(cache)
    }

    /// A tier store over a fresh local tier and `remote`, not yet initialized.
    pub fn two_tier_store(remote: Arc<MockRemoteTier>, call_timeout: Duration) -> TierStore {
        let remote: Arc<dyn CacheTier> = remote;
        TierStore::new(Arc::new(LocalTier::new(1000)), Some(remote), call_timeout)
            .with_handshake_timeout(call_timeout)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for SQL text and result values.

    use super::*;
    use proptest::prelude::*;

    /// Column names that avoid every denylisted keyword as a whole word.
    pub fn arb_column() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("date".to_string()),
            Just("week_day".to_string()),
            Just("hour".to_string()),
            Just("ticket_number".to_string()),
            Just("waiter".to_string()),
            Just("product_name".to_string()),
            Just("quantity".to_string()),
            Just("unitary_price".to_string()),
            Just("total".to_string()),
        ]
    }

    /// A plain `SELECT` over the sales table.
    pub fn arb_select_statement() -> impl Strategy<Value = String> {
        (
            prop::collection::vec(arb_column(), 1..4),
            prop::option::of(1u32..500),
            any::<bool>(),
        )
            .prop_map(|(columns, limit, lower)| {
                let keyword = if lower { "select" } else { "SELECT" };
                let mut sql = format!("{} {} FROM sales", keyword, columns.join(", "));
                if let Some(limit) = limit {
                    sql.push_str(&format!(" LIMIT {}", limit));
                }
                sql
            })
    }

    /// One of the denylisted keywords, in random case.
    pub fn arb_denylisted_keyword() -> impl Strategy<Value = String> {
        (0..salesql_query::DENYLIST.len(), any::<bool>()).prop_map(|(idx, lower)| {
            let keyword = salesql_query::DENYLIST[idx];
            if lower {
                keyword.to_lowercase()
            } else {
                keyword.to_string()
            }
        })
    }

    /// A scalar cell of any kind.
    pub fn arb_cell_value() -> impl Strategy<Value = CellValue> {
        prop_oneof![
            Just(CellValue::Null),
            any::<i64>().prop_map(CellValue::Integer),
            (-1.0e9f64..1.0e9).prop_map(CellValue::Real),
            "[a-zA-Z0-9 ]{0,16}".prop_map(CellValue::Text),
        ]
    }

    /// A well-formed result with 1-4 columns and up to 20 rows.
    pub fn arb_query_result() -> impl Strategy<Value = QueryResult> {
        (1usize..5).prop_flat_map(|width| {
            let columns: Vec<String> = (0..width).map(|i| format!("c{}", i)).collect();
            prop::collection::vec(prop::collection::vec(arb_cell_value(), width), 0..20)
                .prop_map(move |rows| QueryResult::new(columns.clone(), rows))
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on query outcomes.

    use super::*;

    /// Assert that a result is the generic unsafe-query refusal.
    #[track_caller]
    pub fn assert_unsafe_query<T: std::fmt::Debug>(result: &Result<T, QueryError>) {
        match result {
            Err(QueryError::UnsafeQuery) => {}
            other => panic!("Expected UnsafeQuery, got: {:?}", other),
        }
    }

    /// Assert that a result is an execution failure whose message contains `needle`.
    #[track_caller]
    pub fn assert_execution_error<T: std::fmt::Debug>(
        result: &Result<T, QueryError>,
        needle: &str,
    ) {
        match result {
            Err(QueryError::Execution { message }) => assert!(
                message.contains(needle),
                "Execution error {:?} does not mention {:?}",
                message,
                needle
            ),
            other => panic!("Expected Execution error, got: {:?}", other),
        }
    }
}
