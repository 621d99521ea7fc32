//! # Reasoning Trace Cache
//!
//! Bounded LRU for the traces behind `explain_reasoning`.
//!
//! Recency uses a logical clock, not wall time, and both maps are
//! `BTreeMap`s, so eviction order is fully deterministic. The cache holds
//! audit data only; no query ever reads another query's entry to answer.

use std::collections::BTreeMap;

/// Default number of traces kept.
pub const DEFAULT_TRACE_CACHE_SIZE: usize = 256;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    last_access: u64,
}

/// Least-recently-used map with a logical clock.
#[derive(Debug)]
pub struct LruCache<K: Ord + Clone, V> {
    entries: BTreeMap<K, Entry<V>>,
    /// Logical timestamp -> key, oldest first.
    recency: BTreeMap<u64, K>,
    capacity: usize,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Counters for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl<K: Ord + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CACHE_SIZE)
    }
}

impl<K: Ord + Clone, V> LruCache<K, V> {
    /// Cache holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            recency: BTreeMap::new(),
            capacity: capacity.max(1),
            clock: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock = self.clock.saturating_add(1);
        self.clock
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = self.tick();
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.recency.remove(&entry.last_access);
                self.recency.insert(now, key.clone());
                entry.last_access = now;
                self.hits = self.hits.saturating_add(1);
                Some(&entry.value)
            }
            None => {
                self.misses = self.misses.saturating_add(1);
                None
            }
        }
    }

    /// Look up `key` without touching recency or counters.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Insert or replace, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: K, value: V) {
        let now = self.tick();
        if let Some(previous) = self.entries.remove(&key) {
            self.recency.remove(&previous.last_access);
        } else if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.recency.insert(now, key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                last_access: now,
            },
        );
    }

    fn evict_oldest(&mut self) {
        if let Some((_, key)) = self.recency.pop_first() {
            self.entries.remove(&key);
            self.evictions = self.evictions.saturating_add(1);
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.last_access);
        Some(entry.value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
