//! salesql Cache - Two-Tier Result Cache
//!
//! A bounded in-process tier backed by an optional Redis tier. Redis is
//! preferred when reachable and silently bypassed when not; the local tier
//! always takes writes, so the service keeps answering from memory while
//! Redis is down.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                CacheService                  │
//! │   KeyDeriver · memoize · hit/miss counters   │
//! ├──────────────────────────────────────────────┤
//! │                 TierStore                    │
//! │  remote first on read, write-through on set  │
//! ├─────────────────────┬────────────────────────┤
//! │     RedisTier       │       LocalTier        │
//! │  SETEX envelopes    │  count-bounded, FIFO   │
//! └─────────────────────┴────────────────────────┘
//! ```

pub mod config;
pub mod key;
pub mod local;
pub mod redis_tier;
pub mod service;
pub mod tier_store;
pub mod traits;

pub use config::CacheConfig;
pub use key::{canonical_json, KeyDeriver, NAMESPACE_SEPARATOR};
pub use local::LocalTier;
pub use redis_tier::RedisTier;
pub use service::{CacheService, CacheServiceStats};
pub use tier_store::{TierStore, TierStoreStats};
pub use traits::{ttl_seconds, CacheEntry, CacheTier, TierStats};
