//! Bounded, content-addressed transcript cache with LRU eviction.
//!
//! Two jobs with the same fingerprint that arrive together can both miss and
//! both reach the transcriber. Lookups are not serialized against in-flight
//! work; whichever insert lands last just refreshes the entry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;

use crate::fingerprint::Fingerprint;
use crate::metrics::{CACHE_ENTRIES, CACHE_EVICTIONS_TOTAL};

/// Counters describing cache behavior, served under `cache` in `/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries pushed out to make room.
    pub evictions: u64,
    /// Entries currently held.
    pub len: usize,
    /// Maximum entries.
    pub capacity: usize,
}

/// Fingerprint → transcript map holding at most `capacity` entries.
pub struct ResultCache {
    inner: Mutex<LruCache<Fingerprint, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    /// Create a cache. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the cached transcript and mark it most recently used.
    pub fn lookup(&self, key: &Fingerprint) -> Option<String> {
        let found = self.inner.lock().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        let _ = counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `text` under `key`, evicting the least recently used entry if
    /// the cache is full. Re-inserting an existing key replaces the value and
    /// refreshes its recency. Returns the evicted key, if any.
    pub fn insert(&self, key: Fingerprint, text: String) -> Option<Fingerprint> {
        let (displaced, len) = {
            let mut inner = self.inner.lock();
            let displaced = inner.push(key, text);
            (displaced, inner.len())
        };
        gauge!(CACHE_ENTRIES).set(len as f64);
        match displaced {
            Some((old, _)) if old != key => {
                let _ = self.evictions.fetch_add(1, Ordering::Relaxed);
                counter!(CACHE_EVICTIONS_TOTAL).increment(1);
                Some(old)
            }
            _ => None,
        }
    }

    /// Whether `key` is present. Does not touch recency or counters.
    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.inner.lock().contains(key)
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let (len, capacity) = {
            let inner = self.inner.lock();
            (inner.len(), inner.cap().get())
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    fn fp(n: u8) -> Fingerprint {
        Fingerprint::of(&[n])
    }

    #[test]
    fn miss_then_hit() {
        let cache = ResultCache::new(4);
        assert_eq!(cache.lookup(&fp(1)), None);
        let _ = cache.insert(fp(1), "one".into());
        assert_eq!(cache.lookup(&fp(1)).as_deref(), Some("one"));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn evicts_least_recently_inserted() {
        let cache = ResultCache::new(2);
        let _ = cache.insert(fp(1), "a".into());
        let _ = cache.insert(fp(2), "b".into());
        assert_eq!(cache.insert(fp(3), "c".into()), Some(fp(1)));
        assert!(!cache.contains(&fp(1)));
        assert_eq!(cache.stats().len, 2);
    }

    #[test]
    fn lookup_refreshes_recency() {
        let cache = ResultCache::new(2);
        let _ = cache.insert(fp(1), "a".into());
        let _ = cache.insert(fp(2), "b".into());
        let _ = cache.lookup(&fp(1));
        assert_eq!(cache.insert(fp(3), "c".into()), Some(fp(2)));
        assert!(cache.contains(&fp(1)));
    }

    #[test]
    fn reinsert_updates_without_duplicate_or_eviction() {
        let cache = ResultCache::new(2);
        let _ = cache.insert(fp(1), "a".into());
        let _ = cache.insert(fp(2), "b".into());
        assert_eq!(cache.insert(fp(1), "a2".into()), None);
        assert_eq!(cache.stats().len, 2);
        assert_eq!(cache.stats().evictions, 0);
        // fp(1) is now most recent, so fp(2) goes next.
        assert_eq!(cache.insert(fp(3), "c".into()), Some(fp(2)));
        assert_eq!(cache.lookup(&fp(1)).as_deref(), Some("a2"));
    }

    #[test]
    fn exactly_one_eviction_per_insert_over_capacity() {
        let cache = ResultCache::new(3);
        for n in 0..10 {
            let _ = cache.insert(fp(n), n.to_string());
            assert!(cache.stats().len <= 3);
        }
        assert_eq!(cache.stats().evictions, 7);
        for n in 7..10 {
            assert!(cache.contains(&fp(n)));
        }
    }

    #[test]
    fn contains_does_not_change_order() {
        let cache = ResultCache::new(2);
        let _ = cache.insert(fp(1), "a".into());
        let _ = cache.insert(fp(2), "b".into());
        assert!(cache.contains(&fp(1)));
        assert_eq!(cache.insert(fp(3), "c".into()), Some(fp(1)));
    }

    #[test]
    fn zero_capacity_is_raised() {
        let cache = ResultCache::new(0);
        let stats = cache.stats();
        assert_eq!((stats.len, stats.capacity), (0, 1));
    }

    #[test]
    fn evictions_and_size_reach_prometheus_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            let cache = ResultCache::new(2);
            for n in 0..5 {
                let _ = cache.insert(fp(n), n.to_string());
            }
        });
        let text = handle.render();
        assert!(text.contains("scribe_cache_evictions_total 3"), "{text}");
        assert!(text.contains("scribe_cache_entries 2"), "{text}");
    }

    #[test]
    fn bounded_under_concurrent_inserts() {
        let cache = Arc::new(ResultCache::new(16));
        std::thread::scope(|s| {
            for t in 0..8u8 {
                let cache = Arc::clone(&cache);
                let _ = s.spawn(move || {
                    for n in 0..50u8 {
                        let key = Fingerprint::of(&[t, n]);
                        let _ = cache.insert(key, format!("{t}-{n}"));
                        let _ = cache.lookup(&key);
                    }
                });
            }
        });
        assert_eq!(cache.stats().len, 16);
        assert_eq!(cache.stats().evictions, 8 * 50 - 16);
    }
}
