//! LRU caching layer for query and statistics responses
//!
//! A generic bounded cache with hit/miss accounting. The engine keeps one
//! instance in front of query responses and one in front of statistics
//! responses; both are cleared whenever the underlying index changes.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Default capacity for the query response cache
pub const DEFAULT_QUERY_CACHE_SIZE: usize = 128;

/// Default capacity for the statistics response cache
pub const DEFAULT_STATS_CACHE_SIZE: usize = 64;

/// Snapshot of cache usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// hits / (hits + misses), 0.0 when untouched
    pub hit_rate: f64,
}

struct CacheInner<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    hits: u64,
    misses: u64,
}

/// Bounded least-recently-used cache with hit/miss counters
///
/// All operations take `&self`; the interior is mutex-protected so one
/// instance can be shared by reference from concurrent readers.
pub struct LruQueryCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<CacheInner<K, V>>,
    max_size: usize,
}

impl<K: Hash + Eq, V: Clone> LruQueryCache<K, V> {
    /// Create a cache bounded to `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
                hits: 0,
                misses: 0,
            }),
            max_size: capacity,
        }
    }

    /// Look up a key, refreshing its recency on a hit
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(value) => {
                let value = value.clone();
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or refresh an entry, evicting the least-recently-used one
    /// past capacity
    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().entries.put(key, value);
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Current usage counters
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                inner.hits as f64 / total as f64
            },
        }
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when no entries are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
