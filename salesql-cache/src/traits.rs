//! Cache tier trait and the entry envelope stored by TTL-aware tiers.
//!
//! Both the local tier and the distributed tier implement [`CacheTier`]; the
//! [`TierStore`](crate::TierStore) composes one of each under its fallback
//! policy. Values cross the trait as `serde_json::Value`, so every tier owns
//! an independent copy of what it stores.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use salesql_core::CacheResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pluggable cache tier.
///
/// Implementations must be safe to call concurrently from many tasks.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short name used in logs and stats (e.g. `"local"`, `"redis"`).
    fn name(&self) -> &'static str;

    /// Get a value. Expired entries are reported as absent by tiers that
    /// honour TTLs.
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Store a value, replacing any previous value for the key.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry held by this tier.
    async fn clear(&self) -> CacheResult<()>;

    /// Health probe.
    async fn ping(&self) -> CacheResult<()>;

    /// Occupancy and backend-reported counters.
    async fn stats(&self) -> CacheResult<TierStats>;

    /// Release connections. Default is a no-op.
    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Statistics reported by a single tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    /// Number of entries, when the tier can count them cheaply.
    pub entry_count: Option<u64>,
    /// Configured entry bound, for bounded tiers.
    pub capacity: Option<u64>,
    /// Number of bulk evictions performed.
    pub evictions: u64,
    /// Backend-reported values, passed through without interpretation.
    pub passthrough: BTreeMap<String, String>,
}

/// Envelope written to TTL-aware tiers.
///
/// The TTL itself is enforced by the backend; `inserted_at` and
/// `ttl_seconds` travel with the value so an entry can be checked for
/// staleness after it has been read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub inserted_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Value, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            inserted_at: Utc::now(),
            ttl_seconds: ttl_seconds(ttl),
        }
    }

    /// An entry is stale once `inserted_at + ttl_seconds` lies in the past.
    ///
    /// A TTL too large to represent as a timestamp never goes stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| self.inserted_at.checked_add_signed(ttl))
            .map_or(false, |expires_at| expires_at < now)
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }
}

/// Whole seconds for a TTL, never below one second.
///
/// Redis rejects `SETEX` with a zero expiry.
pub fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ttl_seconds_floor() {
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(300)), 300);
    }

    #[test]
    fn test_cache_entry_staleness() {
        let entry = CacheEntry::new("sql_query:abc", json!({"rows": []}), Duration::from_secs(1));
        assert!(!entry.is_stale_at(entry.inserted_at));
        assert!(!entry.is_stale_at(entry.inserted_at + chrono::Duration::seconds(1)));
        assert!(entry.is_stale_at(entry.inserted_at + chrono::Duration::seconds(2)));
    }

    #[test]
    fn test_huge_ttl_never_goes_stale() {
        let far = CacheEntry::new("k", json!(1), Duration::from_secs(u64::MAX));
        assert_eq!(far.ttl_seconds, u64::MAX);
        assert!(!far.is_stale());

        let beyond_calendar = CacheEntry::new("k", json!(1), Duration::from_secs(i64::MAX as u64 / 2));
        assert!(!beyond_calendar.is_stale());
    }

    #[test]
    fn test_tier_stats_default() {
        let stats = TierStats::default();
        assert!(stats.entry_count.is_none());
        assert_eq!(stats.evictions, 0);
        assert!(stats.passthrough.is_empty());
    }
}
