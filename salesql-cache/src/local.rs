//! Bounded in-process cache tier.
//!
//! Lives for the lifetime of the process and is never persisted. The tier is
//! expiry-unaware: TTLs passed to [`CacheTier::set`] are ignored, and size is
//! bounded by entry count instead.
//!
//! # Eviction
//!
//! When an insert pushes the tier past its capacity, only the newest half of
//! the entries (by first insertion) is kept and the oldest half is dropped in
//! one pass. Reads do not affect ordering and overwriting a key keeps its
//! original position, so this is an approximate FIFO and not an LRU.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use salesql_core::{CacheError, CacheResult};
use serde_json::Value;
use tracing::debug;

use crate::traits::{CacheTier, TierStats};

#[derive(Debug)]
struct Slot {
    seq: u64,
    value: Value,
}

#[derive(Debug, Default)]
struct LocalState {
    entries: HashMap<String, Slot>,
    next_seq: u64,
    evictions: u64,
}

impl LocalState {
    fn insert(&mut self, key: &str, value: Value, capacity: usize) -> usize {
        match self.entries.get_mut(key) {
            Some(slot) => slot.value = value,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(key.to_string(), Slot { seq, value });
            }
        }

        if self.entries.len() > capacity {
            self.evict_oldest_half(capacity / 2)
        } else {
            0
        }
    }

    /// Keep the `retain` most recently inserted entries.
    fn evict_oldest_half(&mut self, retain: usize) -> usize {
        let mut order: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(key, slot)| (slot.seq, key.clone()))
            .collect();
        order.sort_unstable_by_key(|(seq, _)| *seq);

        let drop_count = order.len().saturating_sub(retain);
        for (_, key) in order.into_iter().take(drop_count) {
            self.entries.remove(&key);
        }
        self.evictions += 1;
        drop_count
    }
}

/// In-process cache tier bounded by entry count.
#[derive(Debug)]
pub struct LocalTier {
    state: Mutex<LocalState>,
    capacity: usize,
}

impl LocalTier {
    /// Create a local tier holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Synchronous insert, returns how many entries were evicted.
    pub fn insert(&self, key: &str, value: Value) -> CacheResult<usize> {
        let mut state = self.state.lock().map_err(|_| CacheError::LockPoisoned)?;
        let evicted = state.insert(key, value, self.capacity);
        if evicted > 0 {
            debug!(
                evicted,
                remaining = state.entries.len(),
                capacity = self.capacity,
                "Local cache tier over capacity, dropped oldest half"
            );
        }
        Ok(evicted)
    }

    /// Synchronous lookup returning a copy of the stored value.
    pub fn lookup(&self, key: &str) -> CacheResult<Option<Value>> {
        let state = self.state.lock().map_err(|_| CacheError::LockPoisoned)?;
        Ok(state.entries.get(key).map(|slot| slot.value.clone()))
    }

    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        let mut state = self.state.lock().map_err(|_| CacheError::LockPoisoned)?;
        Ok(state.entries.remove(key).is_some())
    }

    pub fn clear_all(&self) -> CacheResult<()> {
        let mut state = self.state.lock().map_err(|_| CacheError::LockPoisoned)?;
        state.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl CacheTier for LocalTier {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, value: &Value, _ttl: Duration) -> CacheResult<()> {
        self.insert(key, value.clone()).map(|_| ())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.remove(key).map(|_| ())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.clear_all()
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn stats(&self) -> CacheResult<TierStats> {
        let state = self.state.lock().map_err(|_| CacheError::LockPoisoned)?;
        Ok(TierStats {
            entry_count: Some(state.entries.len() as u64),
            capacity: Some(self.capacity as u64),
            evictions: state.evictions,
            ..Default::default()
        })
    }
}
