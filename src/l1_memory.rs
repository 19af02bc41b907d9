//! In-process L1 memory cache
//!
//! A bounded mapping from key to entry with TTL expiry and approximate-LRU
//! eviction. Used standalone or as the first tier of the two-tier engine.
//! Every mutating operation is atomic per key; reads never observe a torn
//! `(value, expires_at, last_access)` triple.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

const DEFAULT_CLEANUP_INTERVAL_OPS: u64 = 64;
const DEFAULT_CLEANUP_SCAN_LIMIT: usize = 32;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    created_at: Instant,
    last_access: Instant,
    /// Monotonic insertion sequence, used to break LRU ties deterministically.
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Configuration for the L1 memory cache.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    pub max_entries: usize,
    pub cleanup_interval_ops: u64,
    pub cleanup_scan_limit: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            cleanup_interval_ops: DEFAULT_CLEANUP_INTERVAL_OPS,
            cleanup_scan_limit: DEFAULT_CLEANUP_SCAN_LIMIT,
        }
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Bounded in-process cache with TTL and approximate-LRU eviction.
///
/// A single `Mutex` guards the map. L1 operations never suspend, so this is
/// cheap: holding the lock across a `HashMap` lookup plus an `Instant`
/// comparison is microseconds, well under the contention cost of any
/// fine-grained scheme for the workloads this cache targets.
pub struct MemoryCache {
    config: MemoryCacheConfig,
    inner: Mutex<Inner>,
    ops_since_cleanup: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// Point-in-time statistics for the L1 cache.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryCacheStats {
    pub entry_count: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub estimated_size_bytes: u64,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            ops_since_cleanup: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Fetch the raw payload for `key`, treating expired entries as absent.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.maybe_cleanup();
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("memory cache mutex poisoned");

        let expired = inner.entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false);
        if expired {
            inner.entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace `key` with `value`, evicting the least-recently-used
    /// entry first if the cache is full and `key` is new.
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        self.maybe_cleanup();
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("memory cache mutex poisoned");

        let is_new = !inner.entries.contains_key(key);
        if is_new && inner.entries.len() >= self.config.max_entries {
            self.evict_one_locked(&mut inner);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|d| now + d),
                created_at: now,
                last_access: now,
                seq,
            },
        );
    }

    /// Remove `key`, returning whether it existed (and was not already expired).
    pub fn delete(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("memory cache mutex poisoned");
        match inner.entries.remove(key) {
            Some(entry) => !entry.is_expired(now),
            None => false,
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        let now = Instant::now();
        let inner = self.inner.lock().expect("memory cache mutex poisoned");
        matches!(inner.entries.get(key), Some(entry) if !entry.is_expired(now))
    }

    /// Remove every entry. O(n).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("memory cache mutex poisoned");
        inner.entries.clear();
    }

    /// Remaining time-to-live for `key`, or `None` if absent/expired/permanent.
    pub fn get_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("memory cache mutex poisoned");
        let entry = inner.entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    /// Non-expired keys at the moment of the call. Not guaranteed to reflect
    /// concurrent writes; intended for maintenance tasks only.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("memory cache mutex poisoned");
        inner
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn get_stats(&self) -> MemoryCacheStats {
        let inner = self.inner.lock().expect("memory cache mutex poisoned");
        let estimated_size_bytes = inner
            .entries
            .iter()
            .map(|(k, e)| (k.len() + e.value.len()) as u64)
            .sum();

        MemoryCacheStats {
            entry_count: inner.entries.len(),
            max_entries: self.config.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            estimated_size_bytes,
        }
    }

    pub fn created_at(&self, key: &str) -> Option<Instant> {
        let inner = self.inner.lock().expect("memory cache mutex poisoned");
        inner.entries.get(key).map(|e| e.created_at)
    }

    fn evict_one_locked(&self, inner: &mut Inner) {
        let victim = inner
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.last_access, e.seq))
            .map(|(k, _)| k.clone());
        if let Some(key) = victim {
            inner.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Every `cleanup_interval_ops` calls, scan up to `cleanup_scan_limit`
    /// oldest-inserted entries and purge any that have expired. Bounds
    /// worst-case cleanup cost and amortizes to O(1) per operation.
    fn maybe_cleanup(&self) {
        let count = self.ops_since_cleanup.fetch_add(1, Ordering::Relaxed) + 1;
        if count < self.config.cleanup_interval_ops {
            return;
        }
        self.ops_since_cleanup.store(0, Ordering::Relaxed);

        let now = Instant::now();
        let mut inner = self.inner.lock().expect("memory cache mutex poisoned");
        let mut candidates: Vec<(String, u64)> = inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.seq))
            .collect();
        candidates.sort_by_key(|(_, seq)| *seq);
        candidates.truncate(self.config.cleanup_scan_limit);

        let mut purged = 0u64;
        for (key, _) in candidates {
            if inner.entries.get(&key).map(|e| e.is_expired(now)).unwrap_or(false) {
                inner.entries.remove(&key);
                purged += 1;
            }
        }
        if purged > 0 {
            self.expirations.fetch_add(purged, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_capacity(n: usize) -> MemoryCache {
        MemoryCache::new(MemoryCacheConfig {
            max_entries: n,
            ..MemoryCacheConfig::default()
        })
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = cache_with_capacity(10);
        cache.set("k1", b"v1".to_vec(), None);
        assert_eq!(cache.get("k1"), Some(b"v1".to_vec()));
        assert!(cache.exists("k1"));
    }

    #[test]
    fn delete_makes_key_absent() {
        let cache = cache_with_capacity(10);
        cache.set("k1", b"v1".to_vec(), None);
        assert!(cache.delete("k1"));
        assert_eq!(cache.get("k1"), None);
        assert!(!cache.exists("k1"));
    }

    #[test]
    fn expired_entry_is_absent_and_purged() {
        let cache = cache_with_capacity(10);
        cache.set("k1", b"v1".to_vec(), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get_stats().entry_count, 0);
    }

    #[test]
    fn eviction_respects_capacity() {
        let cache = cache_with_capacity(2);
        cache.set("a", b"1".to_vec(), None);
        cache.set("b", b"2".to_vec(), None);
        cache.set("c", b"3".to_vec(), None);
        assert!(cache.get_stats().entry_count <= 2);
    }

    #[test]
    fn least_recently_used_entry_is_evicted_first() {
        let cache = cache_with_capacity(2);
        cache.set("a", b"1".to_vec(), None);
        cache.set("b", b"2".to_vec(), None);
        // touch "a" so "b" becomes the LRU victim
        cache.get("a");
        cache.set("c", b"3".to_vec(), None);
        assert!(cache.exists("a"));
        assert!(!cache.exists("b"));
        assert!(cache.exists("c"));
    }

    #[test]
    fn clear_removes_everything() {
        let cache = cache_with_capacity(10);
        cache.set("a", b"1".to_vec(), None);
        cache.set("b", b"2".to_vec(), None);
        cache.clear();
        assert_eq!(cache.get_stats().entry_count, 0);
    }

    #[test]
    fn ttl_reports_remaining_duration() {
        let cache = cache_with_capacity(10);
        cache.set("a", b"1".to_vec(), Some(Duration::from_secs(60)));
        let ttl = cache.get_ttl("a").expect("ttl present");
        assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(55));
    }

    #[test]
    fn periodic_cleanup_purges_expired_entries_without_explicit_get() {
        let cache = MemoryCache::new(MemoryCacheConfig {
            max_entries: 100,
            cleanup_interval_ops: 4,
            cleanup_scan_limit: 10,
        });
        cache.set("a", b"1".to_vec(), Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(10));
        for i in 0..4 {
            cache.set(&format!("other{i}"), b"x".to_vec(), None);
        }
        assert!(!cache.exists("a"));
    }
}
