//! Cache service: key derivation plus the two-tier store.
//!
//! Constructed once at startup and shared by `Arc` with whatever needs it;
//! there is no process-wide instance. Lifecycle:
//!
//! ```ignore
//! let cache = Arc::new(CacheService::connect(&CacheConfig::from_env()).await);
//! let _probe = cache.spawn_health_check(config.health_check_interval);
//! // ...
//! cache.close().await;
//! ```
//!
//! # Memoization
//!
//! [`CacheService::memoize`] wraps any fallible async operation. Concurrent
//! callers that miss on the same key are not coalesced: each runs the
//! operation and writes the (identical) result. Writes are whole-value
//! overwrites, so the last writer wins without harm.

use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::key::KeyDeriver;
use crate::local::LocalTier;
use crate::redis_tier::RedisTier;
use crate::tier_store::{TierStore, TierStoreStats};
use crate::traits::CacheTier;

/// Key payload for a memoized call.
#[derive(Debug, Serialize)]
struct MemoPayload<'a, A> {
    function: &'a str,
    args: &'a A,
}

/// Service-level counters on top of the tier snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheServiceStats {
    pub hits: u64,
    pub misses: u64,
    #[serde(flatten)]
    pub tiers: TierStoreStats,
}

impl CacheServiceStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Two-tier cache with key derivation and memoization.
pub struct CacheService {
    store: TierStore,
    keys: KeyDeriver,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheService {
    /// Wrap an already composed tier store.
    pub fn new(store: TierStore) -> Self {
        Self {
            store,
            keys: KeyDeriver::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A service with only a bounded local tier.
    pub fn local_only(capacity: usize) -> Self {
        Self::new(TierStore::local_only(capacity))
    }

    /// Build the tiers described by `config` and probe the distributed tier.
    ///
    /// Never fails. A bad Redis URL or an unreachable Redis leaves the
    /// service running on the local tier alone.
    pub async fn connect(config: &CacheConfig) -> Self {
        let local: Arc<dyn CacheTier> = Arc::new(LocalTier::new(config.local_capacity));

        let remote: Option<Arc<dyn CacheTier>> = match &config.redis_url {
            Some(url) => match RedisTier::open(url) {
                Ok(tier) => Some(Arc::new(tier)),
                Err(e) => {
                    warn!(error = %e, "Invalid distributed cache configuration, using local cache only");
                    None
                }
            },
            None => None,
        };

        let store = TierStore::new(local, remote, config.call_timeout)
            .with_handshake_timeout(config.connect_timeout);
        let service = Self::new(store);
        service.initialize().await;
        service
    }

    /// Probe the distributed tier. See [`TierStore::initialize`].
    pub async fn initialize(&self) -> bool {
        self.store.initialize().await
    }

    /// Release the distributed tier connection.
    pub async fn close(&self) {
        self.store.close().await;
        info!("Cache service closed");
    }

    /// Re-probe the distributed tier every `interval` until the handle is
    /// aborted or the runtime shuts down.
    pub fn spawn_health_check(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; initialize() already probed.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                service.store.health_check().await;
            }
        })
    }

    /// The underlying tier store.
    pub fn tiers(&self) -> &TierStore {
        &self.store
    }

    /// Derive a `namespace:hash` key for `payload`.
    pub fn derive_key<P>(&self, namespace: &str, payload: &P) -> String
    where
        P: Serialize + Debug + ?Sized,
    {
        self.keys.derive(namespace, payload)
    }

    /// Read and decode a value. Undecodable entries count as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.store.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape, ignoring");
                None
            }
        }
    }

    /// Encode and store a value. Returns `true` when the local write succeeded.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> bool
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(value) {
            Ok(json) => self.store.set(key, &json, ttl).await,
            Err(e) => {
                warn!(key, error = %e, "Value is not cacheable");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    /// Drop everything from both tiers.
    pub async fn clear(&self) -> bool {
        let cleared = self.store.clear().await;
        info!(cleared, "Cache cleared");
        cleared
    }

    pub async fn stats(&self) -> CacheServiceStats {
        CacheServiceStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            tiers: self.store.stats().await,
        }
    }

    /// Run `operation` through the cache.
    ///
    /// The key is derived from `namespace`, `function` and `args`. On a hit
    /// the cached value is returned and `operation` is not called. On a miss
    /// `operation` runs; a successful result is stored for `ttl` and
    /// returned, an error is returned as-is and nothing is stored.
    pub async fn memoize<A, T, E, F, Fut>(
        &self,
        namespace: &str,
        function: &str,
        args: &A,
        ttl: Duration,
        operation: F,
    ) -> Result<T, E>
    where
        A: Serialize + Debug,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.derive_key(namespace, &MemoPayload { function, args });

        if let Some(cached) = self.get::<T>(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(function, key = %key, "Cache hit");
            return Ok(cached);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(function, key = %key, "Cache miss, executing");

        let result = operation().await?;
        self.set(&key, &result, ttl).await;
        Ok(result)
    }
}
