//! SQL safety gate.
//!
//! A blocklist check, not a parser. Text is accepted when, after trimming and
//! upper-casing, it starts with `SELECT` and contains none of the denylisted
//! keywords as a whole word. Known gaps:
//!
//! - comments and string literals are not understood, so a keyword inside a
//!   literal (`WHERE note = 'drop'`) is rejected;
//! - engine-specific constructs that mutate state without a denylisted
//!   keyword (`PRAGMA`, `ATTACH`, `REPLACE`, a `WITH` prefix) are not covered
//!   beyond the `SELECT` prefix requirement;
//! - only the prefix is checked, so `SELECTED_ROWS` also passes the prefix
//!   test (and then fails in the engine);
//! - an unterminated `/*` comment runs to the end of the text in SQLite, so
//!   it also hides the `LIMIT`/`OFFSET` clause that pagination appends and
//!   such a statement returns every row.
//!
//! The text that gets executed is always the caller's original, never the
//! normalized form.

use once_cell::sync::Lazy;
use regex::Regex;
use salesql_core::QueryError;
use tracing::warn;

/// Keywords rejected anywhere in a statement.
pub const DENYLIST: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE", "EXEC", "SYSTEM",
    "SHUTDOWN",
];

static FORBIDDEN_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"\b({})\b", DENYLIST.join("|"));
    Regex::new(&pattern).expect("invalid denylist regex")
});

/// Why a statement was refused. Only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The statement does not start with `SELECT`.
    NotSelect,
    /// A denylisted keyword appears as a whole word.
    ForbiddenKeyword(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSelect => write!(f, "statement does not start with SELECT"),
            Self::ForbiddenKeyword(keyword) => write!(f, "forbidden keyword {}", keyword),
        }
    }
}

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Rejected(Rejection),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

/// Stateless gate run before any statement reaches the row store.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlSafetyValidator;

impl SqlSafetyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Classify `sql`.
    pub fn check(&self, sql: &str) -> SafetyVerdict {
        let normalized = sql.trim().to_uppercase();

        if !normalized.starts_with("SELECT") {
            return SafetyVerdict::Rejected(Rejection::NotSelect);
        }

        match FORBIDDEN_KEYWORD.find(&normalized) {
            Some(found) => {
                SafetyVerdict::Rejected(Rejection::ForbiddenKeyword(found.as_str().to_string()))
            }
            None => SafetyVerdict::Safe,
        }
    }

    pub fn is_safe(&self, sql: &str) -> bool {
        self.check(sql).is_safe()
    }

    /// Fail with the generic [`QueryError::UnsafeQuery`] when `sql` is refused.
    ///
    /// The specific reason is logged and never returned.
    pub fn ensure_safe(&self, sql: &str) -> Result<(), QueryError> {
        match self.check(sql) {
            SafetyVerdict::Safe => Ok(()),
            SafetyVerdict::Rejected(reason) => {
                warn!(%reason, sql, "Rejected unsafe query");
                Err(QueryError::UnsafeQuery)
            }
        }
    }
}

/// Shorthand for [`SqlSafetyValidator::is_safe`].
pub fn is_safe(sql: &str) -> bool {
    SqlSafetyValidator.is_safe(sql)
}
