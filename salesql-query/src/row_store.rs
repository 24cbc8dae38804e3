//! Row store access.
//!
//! [`RowStore`] is the only way statements reach the database. The SQLite
//! implementation keeps a single connection behind an async mutex and runs
//! every statement on the blocking pool, so callers suspend while waiting
//! for the connection and while the statement runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use salesql_core::{CellValue, QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Statement execution against the sales dataset.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Run `sql` and return its columns and rows. No validation happens here.
    async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<(), QueryError>;
}

/// One row of the `sales` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub date: String,
    pub week_day: String,
    pub hour: String,
    pub ticket_number: String,
    pub waiter: i64,
    pub product_name: String,
    pub quantity: f64,
    pub unitary_price: f64,
    pub total: f64,
}

const CREATE_SALES_TABLE: &str = "CREATE TABLE IF NOT EXISTS sales (
    id INTEGER PRIMARY KEY,
    date TEXT,
    week_day TEXT,
    hour TEXT,
    ticket_number TEXT,
    waiter INTEGER,
    product_name TEXT,
    quantity REAL,
    unitary_price REAL,
    total REAL
)";

const INSERT_SALE: &str = "INSERT INTO sales
    (date, week_day, hour, ticket_number, waiter, product_name, quantity, unitary_price, total)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

/// SQLite-backed row store.
#[derive(Debug, Clone)]
pub struct SqliteRowStore {
    conn: Arc<Mutex<Connection>>,
    acquire_timeout: Duration,
}

impl SqliteRowStore {
    /// Open (or create) the database described by `config`.
    pub fn open(config: &DbConfig) -> Result<Self, QueryError> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(QueryError::execution)?;

        conn.busy_timeout(config.busy_timeout)
            .map_err(QueryError::execution)?;

        info!(path = %config.path.display(), "Opened SQLite row store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            acquire_timeout: config.acquire_timeout,
        })
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, QueryError> {
        Self::open(&DbConfig::in_memory())
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Create the `sales` table if it does not exist yet.
    pub async fn create_schema(&self) -> Result<(), QueryError> {
        self.with_connection(|conn| conn.execute_batch(CREATE_SALES_TABLE))
            .await?;
        info!("Sales schema ready");
        Ok(())
    }

    /// Insert `records` in one transaction. Returns the number inserted.
    pub async fn insert_sales(&self, records: &[SaleRecord]) -> Result<usize, QueryError> {
        let records = records.to_vec();
        let inserted = self
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(INSERT_SALE)?;
                    for r in &records {
                        stmt.execute(params![
                            r.date,
                            r.week_day,
                            r.hour,
                            r.ticket_number,
                            r.waiter,
                            r.product_name,
                            r.quantity,
                            r.unitary_price,
                            r.total,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(records.len())
            })
            .await?;
        debug!(inserted, "Inserted sales records");
        Ok(inserted)
    }

    /// Wait for the connection, bounded by the acquire timeout.
    async fn acquire(&self) -> Result<OwnedMutexGuard<Connection>, QueryError> {
        tokio::time::timeout(self.acquire_timeout, Arc::clone(&self.conn).lock_owned())
            .await
            .map_err(|_| QueryError::ConnectionTimeout {
                waited: self.acquire_timeout,
            })
    }

    /// Run blocking work on the connection off the async workers.
    async fn with_connection<T, F>(&self, work: F) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let mut conn = self.acquire().await?;
        tokio::task::spawn_blocking(move || work(&mut *conn))
            .await
            .map_err(|e| QueryError::WorkerFailed {
                reason: e.to_string(),
            })?
            .map_err(QueryError::execution)
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let sql = sql.to_string();
        self.with_connection(move |conn| run_statement(conn, &sql))
            .await
    }

    async fn ping(&self) -> Result<(), QueryError> {
        self.with_connection(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }
}

fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(cell_from_sqlite(row.get_ref(idx)?));
        }
        rows.push(cells);
    }

    Ok(QueryResult::new(columns, rows))
}

fn cell_from_sqlite(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(v) => CellValue::Integer(v),
        ValueRef::Real(v) => CellValue::Real(v),
        ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(product: &str, total: f64) -> SaleRecord {
        SaleRecord {
            date: "2024-01-15".to_string(),
            week_day: "Monday".to_string(),
            hour: "12:30".to_string(),
            ticket_number: "T-1".to_string(),
            waiter: 7,
            product_name: product.to_string(),
            quantity: 1.0,
            unitary_price: total,
            total,
        }
    }

    async fn seeded() -> SqliteRowStore {
        let store = SqliteRowStore::open_in_memory().unwrap();
        store.create_schema().await.unwrap();
        store
            .insert_sales(&[sale("Coffee", 100.0), sale("Tea", 150.0), sale("Cake", 50.0)])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_execute_sum() {
        let store = seeded().await;
        let result = store
            .execute("SELECT SUM(total) AS total_sales FROM sales")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["total_sales".to_string()]);
        assert_eq!(result.rows, vec![vec![CellValue::Real(300.0)]]);
    }

    #[tokio::test]
    async fn test_columns_follow_projection_order() {
        let store = seeded().await;
        let result = store
            .execute("SELECT total, product_name, waiter FROM sales ORDER BY id")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["total", "product_name", "waiter"]);
        assert_eq!(result.row_count(), 3);
        assert!(result.is_well_formed());
        assert_eq!(
            result.rows[0],
            vec![
                CellValue::Real(100.0),
                CellValue::Text("Coffee".to_string()),
                CellValue::Integer(7),
            ]
        );
    }

    #[tokio::test]
    async fn test_null_cells() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        store.create_schema().await.unwrap();
        let result = store
            .execute("SELECT SUM(total) AS s FROM sales")
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![CellValue::Null]]);
    }

    #[tokio::test]
    async fn test_engine_error_is_execution_failure() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        let err = store.execute("SELECT * FROM missing_table").await.unwrap_err();
        match err {
            QueryError::Execution { message } => assert!(message.contains("missing_table")),
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let store = SqliteRowStore::open_in_memory().unwrap();
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_timeout() {
        let config = DbConfig::in_memory().with_acquire_timeout(Duration::from_millis(50));
        let store = SqliteRowStore::open(&config).unwrap();

        let _held = Arc::clone(&store.conn).lock_owned().await;
        let err = store.execute("SELECT 1").await.unwrap_err();
        assert_eq!(
            err,
            QueryError::ConnectionTimeout {
                waited: Duration::from_millis(50)
            }
        );
        assert!(err.is_retryable());
    }
}
