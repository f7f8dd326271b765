//! Generic LRU + TTL cache shared by the LLM gateway and the metadata
//! extractor, fixing the "lock, LRU move-to-end and TTL check inside the
//! critical section" policy described for shared caches.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    hits: u64,
}

/// A thread-safe, bounded cache with lazy TTL expiration checked on read.
pub struct Cache<K, V> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

/// Point-in-time statistics for a [`Cache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

impl<K: Hash + Eq + Clone, V: Clone> Cache<K, V> {
    /// Create a cache bounded to `max_size` entries with the given TTL.
    #[must_use]
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Fetch a live value, promoting it to most-recently-used. Returns
    /// `None` on miss or expiry; an expired entry is evicted immediately.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        if let Some(entry) = guard.get_mut(key) {
            if entry.inserted_at.elapsed() > self.ttl {
                guard.pop(key);
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return None;
            }
            entry.hits += 1;
            self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Some(entry.value.clone());
        }
        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        None
    }

    /// Insert or replace `key`, evicting the least-recently-used entry when
    /// the cache is at capacity.
    pub fn set(&self, key: K, value: V) {
        let mut guard = self.inner.lock();
        guard.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                hits: 0,
            },
        );
    }

    /// Drop every entry and reset hit/miss counters.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.clear();
        self.hits.store(0, std::sync::atomic::Ordering::Relaxed);
        self.misses.store(0, std::sync::atomic::Ordering::Relaxed);
    }

    /// Seconds elapsed since `key` was inserted, if present and unexpired.
    pub fn age_seconds(&self, key: &K) -> Option<f64> {
        let guard = self.inner.lock();
        guard
            .peek(key)
            .map(|e| e.inserted_at.elapsed().as_secs_f64())
    }

    /// Current hit/miss/size statistics.
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        let hits = self.hits.load(std::sync::atomic::Ordering::Relaxed);
        let misses = self.misses.load(std::sync::atomic::Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate_percent = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            entries: guard.len(),
            max_size: guard.cap().get(),
            ttl_seconds: self.ttl.as_secs(),
            hits,
            misses,
            hit_rate_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_value() {
        let cache: Cache<String, i32> = Cache::new(10, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn miss_on_absent_key() {
        let cache: Cache<String, i32> = Cache::new(10, Duration::from_secs(60));
        assert_eq!(cache.get(&"missing".to_string()), None);
    }

    #[test]
    fn expires_after_ttl() {
        let cache: Cache<String, i32> = Cache::new(10, Duration::from_millis(1));
        cache.set("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn evicts_lru_on_overflow() {
        let cache: Cache<String, i32> = Cache::new(2, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("c".to_string(), 3);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn get_promotes_to_most_recently_used() {
        let cache: Cache<String, i32> = Cache::new(2, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        let _ = cache.get(&"a".to_string());
        cache.set("c".to_string(), 3);
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn clear_resets_stats_and_entries() {
        let cache: Cache<String, i32> = Cache::new(10, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        let _ = cache.get(&"a".to_string());
        let _ = cache.get(&"missing".to_string());
        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn stats_hit_rate_percent() {
        let cache: Cache<String, i32> = Cache::new(10, Duration::from_secs(60));
        cache.set("a".to_string(), 1);
        let _ = cache.get(&"a".to_string());
        let _ = cache.get(&"a".to_string());
        let _ = cache.get(&"missing".to_string());
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate_percent - 66.666_666_666).abs() < 0.01);
    }

    #[test]
    fn age_seconds_is_none_for_missing_key() {
        let cache: Cache<String, i32> = Cache::new(10, Duration::from_secs(60));
        assert_eq!(cache.age_seconds(&"missing".to_string()), None);
    }
}
