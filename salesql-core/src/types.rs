//! Result set types shared by the cache and the query layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Upper bound for a single page of results.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// A single cell in a result row.
///
/// Mirrors the storage classes of the row store. Serialized untagged so a
/// cached result reads back as plain JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(v) => Some(*v as f64),
            CellValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(v) => write!(f, "{}", v),
            CellValue::Real(v) => write!(f, "{}", v),
            CellValue::Text(v) => write!(f, "{}", v),
            CellValue::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Real(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

/// Columnar result of one statement.
///
/// `columns` follow the order of the statement's projection and every row
/// has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// A result with columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn first_row(&self) -> Option<&[CellValue]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Every row has the same arity as the column list.
    pub fn is_well_formed(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.columns.len())
    }
}

/// Pagination info attached to a paginated result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub page_size: i64,
    /// True when the page came back full. A full final page still reports
    /// `true` even though the next page is empty.
    pub has_more: bool,
}

impl PaginationMeta {
    /// Clamp raw request values into the accepted ranges.
    ///
    /// Returns `(page, page_size)` with `page >= 1` and
    /// `1 <= page_size <= MAX_PAGE_SIZE`.
    pub fn clamp(page: i64, page_size: i64) -> (i64, i64) {
        (page.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
    }

    /// Row offset of the first row of `page`.
    ///
    /// Saturates at `i64::MAX`, which the engine treats as past the end.
    pub fn offset(page: i64, page_size: i64) -> i64 {
        page.saturating_sub(1).max(0).saturating_mul(page_size.max(0))
    }
}

/// A page of results plus its pagination info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult {
    #[serde(flatten)]
    pub result: QueryResult,
    pub pagination: PaginationMeta,
}

/// Aggregate dataset statistics: statistic name to the values of its first row.
pub type DatasetStats = BTreeMap<String, Vec<CellValue>>;

/// A translated question together with its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub sql: String,
    pub data: QueryResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamp() {
        assert_eq!(PaginationMeta::clamp(0, 10), (1, 10));
        assert_eq!(PaginationMeta::clamp(-5, 10), (1, 10));
        assert_eq!(PaginationMeta::clamp(3, 5000), (3, 1000));
        assert_eq!(PaginationMeta::clamp(1, 0), (1, 1));
    }

    #[test]
    fn test_pagination_offset() {
        assert_eq!(PaginationMeta::offset(1, 10), 0);
        assert_eq!(PaginationMeta::offset(2, 10), 10);
        assert_eq!(PaginationMeta::offset(5, 25), 100);
    }

    #[test]
    fn test_pagination_offset_saturates() {
        assert_eq!(PaginationMeta::offset(i64::MAX, MAX_PAGE_SIZE), i64::MAX);
        assert_eq!(PaginationMeta::offset(i64::MIN, 10), 0);
    }

    #[test]
    fn test_cell_value_serializes_as_plain_json() {
        let row = vec![
            CellValue::Null,
            CellValue::Integer(3),
            CellValue::Real(300.0),
            CellValue::from("Coffee"),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,3,300.0,"Coffee"]"#);

        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_query_result_well_formed() {
        let ok = QueryResult::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1i64.into(), 2i64.into()]],
        );
        assert!(ok.is_well_formed());
        assert_eq!(ok.first_row().map(|r| r.len()), Some(2));

        let bad = QueryResult::new(vec!["a".to_string()], vec![vec![]]);
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn test_paginated_result_flattens_columns() {
        let page = PaginatedResult {
            result: QueryResult::empty(vec!["total".to_string()]),
            pagination: PaginationMeta {
                page: 1,
                page_size: 10,
                has_more: false,
            },
        };
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["columns"][0], "total");
        assert_eq!(value["pagination"]["page_size"], 10);
    }
}
