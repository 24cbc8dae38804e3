//! Redis-backed distributed cache tier.
//!
//! Shared by every process pointed at the same Redis. Entries are written as
//! JSON [`CacheEntry`] envelopes with `SETEX`, so Redis enforces the TTL.
//! Failures surface as [`CacheError`]s; per-call time bounds are applied by
//! the [`TierStore`](crate::TierStore) that owns this tier.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, InfoDict, RedisResult};
use salesql_core::{CacheError, CacheResult};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::traits::{ttl_seconds, CacheEntry, CacheTier, TierStats};

const TIER_NAME: &str = "redis";

/// INFO fields surfaced in [`TierStats::passthrough`].
const INFO_PASSTHROUGH: &[&str] = &[
    "connected_clients",
    "used_memory_human",
    "keyspace_hits",
    "keyspace_misses",
];

/// Distributed cache tier on top of a Redis connection manager.
///
/// The connection is opened lazily by the first call, so a Redis that is
/// down at startup can still be picked up later by a health check.
pub struct RedisTier {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
}

impl fmt::Debug for RedisTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTier")
            .field("client", &self.client.get_connection_info().addr)
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisTier {
    /// Create a tier for `url`. Only parses the URL; no I/O happens here.
    pub fn open(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unavailable {
            tier: TIER_NAME.to_string(),
            reason: format!("invalid url: {}", e),
        })?;

        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    /// Shared connection, opened on first use.
    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = ConnectionManager::new(self.client.clone())
            .await
            .map_err(|e| CacheError::Unavailable {
                tier: TIER_NAME.to_string(),
                reason: format!("connect failed: {}", e),
            })?;
        debug!("Opened redis connection");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Await one Redis call, tagging failures with the command name.
    async fn call<T, F>(&self, op: &str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        fut.await.map_err(|e| CacheError::Unavailable {
            tier: TIER_NAME.to_string(),
            reason: format!("{} failed: {}", op, e),
        })
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    fn name(&self) -> &'static str {
        TIER_NAME
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = self.call("GET", conn.get(key)).await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            // Redis expires keys lazily; never serve an envelope past its TTL.
            Ok(entry) if entry.is_stale() => {
                debug!(key, "Discarding stale redis entry");
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry.value)),
            Err(e) => {
                // Corrupted entry - treat as a miss
                warn!(key, error = %e, "Failed to decode redis cache entry");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry::new(key, value.clone(), ttl);
        let json = serde_json::to_string(&entry).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

        let mut conn = self.connection().await?;
        self.call("SETEX", conn.set_ex::<_, _, ()>(key, json, ttl_seconds(ttl)))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        self.call("DEL", conn.del::<_, ()>(key)).await
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let cmd = redis::cmd("FLUSHDB");
        let _: () = self.call("FLUSHDB", cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let cmd = redis::cmd("PING");
        let _: String = self.call("PING", cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn stats(&self) -> CacheResult<TierStats> {
        let mut conn = self.connection().await?;

        let info_cmd = redis::cmd("INFO");
        let info: InfoDict = self.call("INFO", info_cmd.query_async(&mut conn)).await?;

        let size_cmd = redis::cmd("DBSIZE");
        let entry_count: u64 = self
            .call("DBSIZE", size_cmd.query_async(&mut conn))
            .await?;

        let passthrough = INFO_PASSTHROUGH
            .iter()
            .filter_map(|field| {
                info.get::<String>(field)
                    .map(|value| (field.to_string(), value))
            })
            .collect();

        Ok(TierStats {
            entry_count: Some(entry_count),
            capacity: None,
            evictions: 0,
            passthrough,
        })
    }

    async fn close(&self) -> CacheResult<()> {
        // Dropping the last manager handle closes the multiplexed connection.
        self.conn.lock().await.take();
        Ok(())
    }
}
