//! Fallback policy over a local tier and an optional distributed tier.
//!
//! The distributed tier is best-effort everywhere: a failed or slow call is
//! logged and the local tier answers instead. Only [`TierStore::initialize`]
//! and [`TierStore::health_check`] change whether the distributed tier is
//! consulted at all; a single failed call never disables it.
//!
//! The tiers are not kept consistent with each other. Each one only reflects
//! its own write history (TTL expiry in Redis, count-based eviction locally).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use salesql_core::{CacheError, CacheResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::local::LocalTier;
use crate::traits::{CacheTier, TierStats};

/// Snapshot of both tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierStoreStats {
    pub remote_configured: bool,
    pub remote_available: bool,
    pub local: TierStats,
    /// Present only while the distributed tier is available and answered.
    pub remote: Option<TierStats>,
}

/// Two-tier key-value store with local fallback.
pub struct TierStore {
    local: Arc<dyn CacheTier>,
    remote: Option<Arc<dyn CacheTier>>,
    remote_available: AtomicBool,
    call_timeout: Duration,
    handshake_timeout: Duration,
}

impl TierStore {
    /// Compose a local tier with an optional distributed tier.
    ///
    /// The distributed tier starts out unavailable; call
    /// [`initialize`](Self::initialize) to probe it.
    pub fn new(
        local: Arc<dyn CacheTier>,
        remote: Option<Arc<dyn CacheTier>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            remote_available: AtomicBool::new(false),
            call_timeout,
            handshake_timeout: Duration::from_secs(2),
        }
    }

    /// Bound for the probes made by `initialize` and `health_check`, which
    /// may have to open a connection first.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// A store with only a bounded local tier.
    pub fn local_only(capacity: usize) -> Self {
        Self::new(
            Arc::new(LocalTier::new(capacity)),
            None,
            Duration::from_millis(500),
        )
    }

    /// Probe the distributed tier once.
    ///
    /// Never fails: an unreachable tier leaves the store in local-only mode.
    /// Returns whether the distributed tier is in use.
    pub async fn initialize(&self) -> bool {
        let Some(remote) = &self.remote else {
            info!("No distributed cache tier configured, using local cache only");
            return false;
        };

        match self.probe(remote.as_ref()).await {
            Ok(()) => {
                self.remote_available.store(true, Ordering::SeqCst);
                info!(tier = remote.name(), "Distributed cache tier initialized");
                true
            }
            Err(e) => {
                self.remote_available.store(false, Ordering::SeqCst);
                warn!(
                    tier = remote.name(),
                    error = %e,
                    "Could not reach distributed cache tier, using local cache only"
                );
                false
            }
        }
    }

    /// Re-probe the distributed tier and switch it on or off accordingly.
    pub async fn health_check(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };

        let healthy = self.probe(remote.as_ref()).await.is_ok();
        let was = self.remote_available.swap(healthy, Ordering::SeqCst);
        match (was, healthy) {
            (false, true) => info!(tier = remote.name(), "Distributed cache tier recovered"),
            (true, false) => warn!(
                tier = remote.name(),
                "Distributed cache tier failed health check, using local cache only"
            ),
            _ => debug!(tier = remote.name(), healthy, "Distributed cache tier health check"),
        }
        healthy
    }

    /// Whether reads and writes currently go to the distributed tier.
    pub fn is_remote_available(&self) -> bool {
        self.remote.is_some() && self.remote_available.load(Ordering::SeqCst)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// The distributed tier, when in use.
    fn active_remote(&self) -> Option<&Arc<dyn CacheTier>> {
        self.remote.as_ref().filter(|_| self.is_remote_available())
    }

    /// Ping under the handshake timeout.
    async fn probe(&self, tier: &dyn CacheTier) -> CacheResult<()> {
        tokio::time::timeout(self.handshake_timeout, tier.ping())
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Timeout {
                    tier: tier.name().to_string(),
                    after: self.handshake_timeout,
                })
            })
    }

    /// Bound one distributed-tier call by `call_timeout`.
    async fn bounded<T, F>(&self, tier: &dyn CacheTier, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Timeout {
                    tier: tier.name().to_string(),
                    after: self.call_timeout,
                })
            })
    }

    /// Read `key`, preferring the distributed tier.
    ///
    /// A distributed-tier miss or failure falls through to the local tier.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(remote) = self.active_remote() {
            match self.bounded(remote.as_ref(), remote.get(key)).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => {
                    warn!(key, error = %e, "Distributed cache read failed, trying local tier");
                }
            }
        }

        match self.local.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Local cache read failed");
                None
            }
        }
    }

    /// Write-through: local always, distributed tier best-effort.
    ///
    /// Returns `true` when the local write succeeded.
    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        let local_ok = match self.local.set(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Local cache write failed");
                false
            }
        };

        if let Some(remote) = self.active_remote() {
            if let Err(e) = self.bounded(remote.as_ref(), remote.set(key, value, ttl)).await {
                warn!(key, error = %e, "Distributed cache write failed");
            }
        }

        local_ok
    }

    /// Delete from both tiers. Returns `true` when the local delete succeeded.
    pub async fn delete(&self, key: &str) -> bool {
        if let Some(remote) = self.active_remote() {
            if let Err(e) = self.bounded(remote.as_ref(), remote.delete(key)).await {
                warn!(key, error = %e, "Distributed cache delete failed");
            }
        }

        match self.local.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Local cache delete failed");
                false
            }
        }
    }

    /// Clear both tiers. Returns `true` when the local clear succeeded.
    pub async fn clear(&self) -> bool {
        if let Some(remote) = self.active_remote() {
            if let Err(e) = self.bounded(remote.as_ref(), remote.clear()).await {
                warn!(error = %e, "Distributed cache clear failed");
            }
        }

        match self.local.clear().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Local cache clear failed");
                false
            }
        }
    }

    /// Report tier activity, local occupancy and distributed-tier counters.
    pub async fn stats(&self) -> TierStoreStats {
        let local = self.local.stats().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read local cache stats");
            TierStats::default()
        });

        let remote = match self.active_remote() {
            Some(remote) => match self.bounded(remote.as_ref(), remote.stats()).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(error = %e, "Failed to read distributed cache stats");
                    None
                }
            },
            None => None,
        };

        TierStoreStats {
            remote_configured: self.remote.is_some(),
            remote_available: self.is_remote_available(),
            local,
            remote,
        }
    }

    /// Release the distributed tier. The local tier stays usable.
    pub async fn close(&self) {
        if let Some(remote) = &self.remote {
            self.remote_available.store(false, Ordering::SeqCst);
            if let Err(e) = remote.close().await {
                warn!(tier = remote.name(), error = %e, "Error closing distributed cache tier");
            }
        }
    }
}
