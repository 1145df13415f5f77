//! Bounded identifier → tracking-hash cache
//!
//! Entries are kept in insertion order. Hits use `peek`, so a lookup never
//! refreshes an entry's position: the "least recently used" end of the
//! underlying `LruCache` is simply the earliest insert. When an insert would
//! exceed the bound, the `evict_chunk` earliest entries are dropped in one go.

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::hasher::TrackingHash;
use super::{DEFAULT_CACHE_EVICT_CHUNK, DEFAULT_CACHE_MAX_ENTRIES};

/// Hit/miss/eviction counters
#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
}

/// Point-in-time view of cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub evicted: u64,
}

#[derive(Debug)]
pub struct HashCache {
    entries: Mutex<LruCache<String, TrackingHash>>,
    max_entries: usize,
    evict_chunk: usize,
    counters: CacheCounters,
}

impl HashCache {
    /// Create a cache bounded to `max_entries`, evicting `evict_chunk` at a time
    ///
    /// Zero values are clamped to 1; `evict_chunk` is clamped to `max_entries`.
    #[must_use]
    pub fn new(max_entries: usize, evict_chunk: usize) -> Self {
        let max_entries = max_entries.max(1);
        let evict_chunk = evict_chunk.clamp(1, max_entries);
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_entries,
            evict_chunk,
            counters: CacheCounters::default(),
        }
    }

    /// Cached digest for `identifier`, without changing its eviction order
    pub fn get(&self, identifier: &str) -> Option<TrackingHash> {
        let hit = self.entries.lock().peek(identifier).cloned();
        let counter = if hit.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Insert a digest, bulk-evicting the earliest entries if the cache is full
    ///
    /// Re-inserting an identifier that is already cached is a no-op, which
    /// covers two concurrent misses racing on the same identifier.
    pub fn insert(&self, identifier: &str, hash: TrackingHash) {
        let mut entries = self.entries.lock();

        if entries.contains(identifier) {
            return;
        }

        if entries.len() >= self.max_entries {
            let mut evicted = 0;
            while evicted < self.evict_chunk && entries.pop_lru().is_some() {
                evicted += 1;
            }
            self.counters
                .evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(
                "Hash cache full ({} entries): evicted {evicted} earliest entries",
                self.max_entries
            );
        }

        entries.put(identifier.to_string(), hash);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[must_use]
    pub const fn evict_chunk(&self) -> usize {
        self.evict_chunk
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            len: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }
}

impl Default for HashCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_EVICT_CHUNK)
    }
}
