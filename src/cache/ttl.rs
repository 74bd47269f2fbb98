use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

/// Source of the current instant, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
    /// Insertion order, used to pick an eviction victim
    seq: u64,
}

/// Internal statistics with atomic counters for thread safety
#[derive(Debug, Default)]
struct CacheStatsInternal {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Hit/miss statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded in-memory cache with per-entry time-to-live.
///
/// An entry older than the TTL is indistinguishable from a missing one and is
/// dropped on the read that finds it. When full, inserting a new key evicts
/// the least recently inserted entry.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    next_seq: AtomicU64,
    stats: CacheStatsInternal,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(ttl, max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            clock,
            next_seq: AtomicU64::new(0),
            stats: CacheStatsInternal::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let fresh = match entries.get(key) {
            Some(entry) if self.is_fresh(entry, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                debug!("Cache entry expired: {}", key);
                None
            }
            None => None,
        };

        match fresh {
            Some(_) => self.stats.hits.fetch_add(1, Ordering::Relaxed),
            None => self.stats.misses.fetch_add(1, Ordering::Relaxed),
        };
        fresh
    }

    /// Store `value` under `key`, resetting its age
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = self.clock.now();
        let mut entries = self.lock();

        entries.retain(|_, entry| self.is_fresh(entry, now));

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let victim = entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                entries.remove(&victim);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Cache full, evicted {}", victim);
            }
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            key,
            Entry {
                value,
                stored_at: now,
                seq,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of fresh entries
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .values()
            .filter(|entry| self.is_fresh(entry, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    /// Reset statistics (useful for testing)
    pub fn reset_stats(&self) {
        self.stats.hits.store(0, Ordering::Relaxed);
        self.stats.misses.store(0, Ordering::Relaxed);
        self.stats.evictions.store(0, Ordering::Relaxed);
    }
}
