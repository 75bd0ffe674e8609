//! An in-memory cache with lazy time-based expiry.
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Source of the current time for [`TtlCache`].
pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The default clock, backed by [`Instant::now`].
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

struct Entries<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    /// `set` sweeps out expired entries once the map reaches this size.
    prune_at: usize,
}

/// A thread-safe cache where every entry lives for `ttl` after it was stored.
///
/// There is no background eviction: an entry is checked for expiry when it is read, and an
/// expired entry is removed at that point. Writes also sweep out expired entries whenever the
/// map has grown past a threshold, so keys that are never read again do not accumulate. A `ttl`
/// of zero means entries are never stored.
pub struct TtlCache<K, V> {
    entries: Mutex<Entries<K, V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Smallest map size at which `set` sweeps out expired entries.
    pub(crate) const PRUNE_THRESHOLD: usize = 256;

    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        TtlCache::with_clock(ttl, Arc::new(SystemClock))
    }

    pub(crate) fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        TtlCache {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                prune_at: Self::PRUNE_THRESHOLD,
            }),
            ttl,
            clock,
        }
    }

    /// Time-to-live of cache entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the value stored under `key` unless it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let entry = entries.map.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            return Some(entry.value.clone());
        }

        entries.map.remove(key);
        None
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// Does nothing when `ttl` is zero.
    pub fn set(&self, key: K, value: V) {
        if self.ttl.is_zero() {
            return;
        }

        let now = self.clock.now();
        let mut entries = self.lock();

        if entries.map.len() >= entries.prune_at {
            let ttl = self.ttl;
            entries
                .map
                .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
            // Next sweep once the live entries have doubled.
            let prune_at = (entries.map.len() * 2).max(Self::PRUNE_THRESHOLD);
            entries.prune_at = prune_at;
        }

        entries.map.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
            },
        );
    }

    /// Remove the entry stored under `key`. Returns `true` if there was one.
    pub fn remove(&self, key: &K) -> bool {
        self.lock().map.remove(key).is_some()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.lock().map.clear();
    }

    /// Number of stored entries, including expired entries that have not been swept yet.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries<K, V>> {
        // Err() is possible only if the lock is poisoned (a thread panicked while holding it).
        // None of the critical sections above can panic.
        self.entries
            .lock()
            .expect("thread holding cache lock should not panic")
    }
}
