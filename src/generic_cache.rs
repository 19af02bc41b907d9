//! The two-tier engine (§4.6)
//!
//! Wires the L1 memory cache, the remote (L2) client, the compression
//! envelope, and the performance monitor together behind the [`Cache`]
//! contract. The AI specialization (`ai_cache.rs`) wraps this rather than
//! inheriting from it, registering callbacks to carry operation tags and
//! text length through to the monitor without this layer knowing anything
//! about AI semantics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::cache_trait::{Cache, CacheHealth, NAMESPACE};
use crate::compression::CacheCompressor;
use crate::config::CacheConfig;
use crate::errors::CacheResult;
use crate::l1_memory::{MemoryCache, MemoryCacheConfig};
use crate::monitor::{OperationKind, PerformanceMonitor};
use crate::remote::RemoteClient;
use crate::security::SecurityAdapter;

type GetCallback = Arc<dyn Fn(&str, Duration) + Send + Sync>;
type SetCallback = Arc<dyn Fn(&str, Duration, usize) + Send + Sync>;
type DeleteCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    get_success: Vec<GetCallback>,
    get_miss: Vec<GetCallback>,
    set_success: Vec<SetCallback>,
    delete_success: Vec<DeleteCallback>,
}

/// In-process L1 + remote L2 cache engine.
pub struct GenericCache {
    default_ttl: Duration,
    fail_on_connection_error: bool,
    redis_url: Option<String>,
    l1: Option<MemoryCache>,
    remote: RwLock<Option<Arc<dyn RemoteClient>>>,
    security: Option<Arc<dyn SecurityAdapter>>,
    compressor: Mutex<CacheCompressor>,
    monitor: Arc<PerformanceMonitor>,
    callbacks: RwLock<Callbacks>,
}

impl GenericCache {
    pub fn new(config: &CacheConfig, security: Option<Arc<dyn SecurityAdapter>>, monitor: Arc<PerformanceMonitor>) -> Self {
        let l1 = if config.enable_l1_cache {
            Some(MemoryCache::new(MemoryCacheConfig {
                max_entries: config.l1_cache_size,
                ..MemoryCacheConfig::default()
            }))
        } else {
            None
        };

        Self {
            default_ttl: Duration::from_secs(config.default_ttl),
            fail_on_connection_error: config.fail_on_connection_error,
            redis_url: config.redis_url.clone(),
            l1,
            remote: RwLock::new(None),
            security,
            compressor: Mutex::new(CacheCompressor::new(config.compression_threshold, config.compression_level)),
            monitor,
            callbacks: RwLock::new(Callbacks::default()),
        }
    }

    /// Establish the remote connection. On failure: fails the whole
    /// construction with `CacheUnavailable` if `fail_on_connection_error` is
    /// set, otherwise logs a warning and leaves the cache running L1-only.
    pub async fn connect(&self) -> CacheResult<()> {
        let Some(url) = self.redis_url.as_ref() else {
            tracing::info!("no redis_url configured; cache runs L1-only");
            return Ok(());
        };

        let attempt = match &self.security {
            Some(adapter) => adapter.create_secure_client(url).await,
            None => crate::remote::RedisRemoteClient::connect(url)
                .await
                .map(|c| Arc::new(c) as Arc<dyn RemoteClient>),
        };

        match attempt {
            Ok(client) => {
                tracing::info!("connected to remote cache store");
                *self.remote.write().await = Some(client);
                Ok(())
            }
            Err(e) if self.fail_on_connection_error => {
                Err(crate::errors::CacheError::CacheUnavailable(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote cache unreachable; degrading to L1-only mode");
                self.monitor.record_remote_unavailable(&e.to_string()).await;
                Ok(())
            }
        }
    }

    pub fn l1_stats(&self) -> Option<crate::l1_memory::MemoryCacheStats> {
        self.l1.as_ref().map(|l1| l1.get_stats())
    }

    /// Non-expired L1 keys, for maintenance-only consumers (pattern
    /// invalidation needs to keep L1 in sync with whatever it removes from
    /// the remote store).
    pub fn l1_keys(&self) -> Vec<String> {
        self.l1.as_ref().map(|l1| l1.keys()).unwrap_or_default()
    }

    /// Remove `key` from L1 only, leaving the remote tier untouched.
    pub fn l1_delete(&self, key: &str) -> bool {
        self.l1.as_ref().map(|l1| l1.delete(key)).unwrap_or(false)
    }

    /// The current remote client, if connected. Used by the AI wrapper to
    /// drive pattern invalidation against the same connection the engine
    /// uses for ordinary get/set traffic.
    pub async fn remote_handle(&self) -> Option<Arc<dyn RemoteClient>> {
        self.remote.read().await.clone()
    }

    /// Take a memory snapshot and feed it to the monitor (spec §4.4 memory
    /// metric). Cheap: `MemoryCache::get_stats` is the only O(n) cost and
    /// only the caller decides how often to pay it.
    pub async fn record_memory_snapshot(&self) {
        if let Some(stats) = self.l1_stats() {
            self.monitor
                .record_memory(stats.estimated_size_bytes, stats.entry_count as u64, None)
                .await;
        }
    }

    pub fn register_get_success(&mut self, cb: GetCallback) {
        self.callbacks.get_mut().get_success.push(cb);
    }
    pub fn register_get_miss(&mut self, cb: GetCallback) {
        self.callbacks.get_mut().get_miss.push(cb);
    }
    pub fn register_set_success(&mut self, cb: SetCallback) {
        self.callbacks.get_mut().set_success.push(cb);
    }
    pub fn register_delete_success(&mut self, cb: DeleteCallback) {
        self.callbacks.get_mut().delete_success.push(cb);
    }

    async fn fire_get_success(&self, key: &str, duration: Duration) {
        for cb in &self.callbacks.read().await.get_success {
            invoke_guarded(|| cb(key, duration));
        }
    }
    async fn fire_get_miss(&self, key: &str, duration: Duration) {
        for cb in &self.callbacks.read().await.get_miss {
            invoke_guarded(|| cb(key, duration));
        }
    }
    async fn fire_set_success(&self, key: &str, duration: Duration, size: usize) {
        for cb in &self.callbacks.read().await.set_success {
            invoke_guarded(|| cb(key, duration, size));
        }
    }
    async fn fire_delete_success(&self, key: &str) {
        for cb in &self.callbacks.read().await.delete_success {
            invoke_guarded(|| cb(key));
        }
    }

    #[cfg(test)]
    pub async fn set_remote_for_test(&self, client: Arc<dyn RemoteClient>) {
        *self.remote.write().await = Some(client);
    }
}

/// Callbacks are caller-supplied and best-effort; a panicking callback must
/// not take down the cache operation that triggered it (spec §4.6).
fn invoke_guarded<F: FnOnce()>(f: F) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).is_err() {
        tracing::warn!("cache callback panicked; ignoring");
    }
}

#[async_trait]
impl Cache for GenericCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let start = Instant::now();

        if let Some(l1) = &self.l1 {
            if let Some(value) = l1.get(key) {
                let duration = start.elapsed();
                self.monitor.record_operation("generic_get", duration, true, value.len()).await;
                self.fire_get_success(key, duration).await;
                return Ok(Some(value));
            }
        }

        let remote = self.remote.read().await.clone();
        if let Some(client) = remote {
            match client.get(key).await {
                Ok(Some(payload)) => {
                    let decoded = {
                        let mut compressor = self.compressor.lock().await;
                        compressor.unenvelope(&payload)
                    };
                    match decoded {
                        Ok(bytes) => {
                            if let Some(l1) = &self.l1 {
                                let residual = client.ttl(key).await.ok().flatten().unwrap_or(self.default_ttl);
                                l1.set(key, bytes.clone(), Some(residual));
                            }
                            let duration = start.elapsed();
                            self.monitor.record_operation("generic_get", duration, true, bytes.len()).await;
                            self.fire_get_success(key, duration).await;
                            return Ok(Some(bytes));
                        }
                        Err(e) => {
                            tracing::warn!(key, error = %e, "L2 payload failed to decode; treating as miss");
                            let _ = client.delete(key).await;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key, error = %e, "remote get failed; treating as miss");
                    self.monitor.record_remote_unavailable(&e.to_string()).await;
                }
            }
        }

        let duration = start.elapsed();
        self.monitor.record_operation("generic_get", duration, false, 0).await;
        self.fire_get_miss(key, duration).await;
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let start = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let value_len = value.len();

        let envelope = {
            let comp_start = Instant::now();
            let mut compressor = self.compressor.lock().await;
            let (envelope, was_compressed) = compressor.envelope(&value)?;
            if was_compressed {
                self.monitor
                    .record_compression(value_len, envelope.len().saturating_sub(1), comp_start.elapsed())
                    .await;
            }
            envelope
        };

        let remote = self.remote.read().await.clone();
        if let Some(client) = remote {
            if let Err(e) = client.set(key, envelope, ttl).await {
                tracing::warn!(key, error = %e, "remote set failed; degrading to L1-only for this write");
                self.monitor.record_remote_unavailable(&e.to_string()).await;
            }
        }

        if let Some(l1) = &self.l1 {
            l1.set(key, value, Some(ttl));
        }

        let duration = start.elapsed();
        self.monitor
            .record_operation_kind("generic_set", duration, false, value_len, OperationKind::Set)
            .await;
        self.fire_set_success(key, duration, value_len).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut existed = false;

        if let Some(l1) = &self.l1 {
            if l1.delete(key) {
                existed = true;
            }
        }

        let remote = self.remote.read().await.clone();
        if let Some(client) = remote {
            match client.delete(key).await {
                Ok(true) => existed = true,
                Ok(false) => {}
                Err(e) => tracing::warn!(key, error = %e, "remote delete failed"),
            }
        }

        if existed {
            self.fire_delete_success(key).await;
        }
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        if let Some(l1) = &self.l1 {
            if l1.exists(key) {
                return Ok(true);
            }
        }

        let remote = self.remote.read().await.clone();
        if let Some(client) = remote {
            return match client.exists(key).await {
                Ok(found) => Ok(found),
                Err(e) => {
                    tracing::warn!(key, error = %e, "remote exists check failed");
                    Ok(false)
                }
            };
        }
        Ok(false)
    }

    async fn clear(&self) -> CacheResult<()> {
        if let Some(l1) = &self.l1 {
            l1.clear();
        }

        let remote = self.remote.read().await.clone();
        if let Some(client) = remote {
            let pattern = format!("{NAMESPACE}*");
            let (keys, exhausted) = client.scan(&pattern).await?;
            if !exhausted {
                tracing::warn!("clear() scan budget exhausted; some namespaced keys may remain");
            }
            for key in keys {
                if let Err(e) = client.delete(&key).await {
                    tracing::warn!(key, error = %e, "failed to delete key during clear()");
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> CacheHealth {
        let remote = self.remote.read().await;
        if let Some(client) = remote.as_ref() {
            return match client.ping().await {
                Ok(()) => CacheHealth::Healthy,
                Err(_) => CacheHealth::Degraded,
            };
        }
        drop(remote);

        match (self.redis_url.is_some(), self.l1.is_some()) {
            (true, true) => CacheHealth::Degraded,
            (true, false) => CacheHealth::Unavailable,
            (false, true) => CacheHealth::Healthy,
            (false, false) => CacheHealth::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_support::FakeRemoteClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor() -> Arc<PerformanceMonitor> {
        Arc::new(PerformanceMonitor::new(Default::default()))
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_l1_only() {
        let cache = GenericCache::new(&CacheConfig::default(), None, monitor());
        cache.set("ai_cache:op:x", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("ai_cache:op:x").await.unwrap(), Some(b"hello".to_vec()));
        assert!(cache.exists("ai_cache:op:x").await.unwrap());
    }

    #[tokio::test]
    async fn delete_makes_key_absent_in_both_tiers() {
        let cache = GenericCache::new(&CacheConfig::default(), None, monitor());
        cache.set_remote_for_test(Arc::new(FakeRemoteClient::default())).await;
        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert!(cache.delete("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn falls_back_to_remote_on_l1_miss() {
        let config = CacheConfig {
            enable_l1_cache: false,
            ..CacheConfig::default()
        };
        let cache = GenericCache::new(&config, None, monitor());
        let remote = Arc::new(FakeRemoteClient::default());
        cache.set_remote_for_test(remote.clone()).await;

        cache.set("k", b"remote value".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"remote value".to_vec()));
    }

    #[tokio::test]
    async fn degrades_gracefully_when_remote_is_unreachable() {
        let cache = GenericCache::new(&CacheConfig::default(), None, monitor());
        cache
            .set_remote_for_test(Arc::new(FakeRemoteClient {
                unreachable: true,
                ..Default::default()
            }))
            .await;

        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.ping().await, CacheHealth::Degraded);
    }

    #[tokio::test]
    async fn remote_errors_surface_as_a_remote_unavailable_alert() {
        let mon = monitor();
        // L1 disabled so get() actually reaches the unreachable remote client.
        let config = CacheConfig {
            enable_l1_cache: false,
            ..CacheConfig::default()
        };
        let cache = GenericCache::new(&config, None, mon.clone());
        cache
            .set_remote_for_test(Arc::new(FakeRemoteClient {
                unreachable: true,
                ..Default::default()
            }))
            .await;

        let _ = cache.get("missing").await.unwrap();
        let _ = cache.set("k", b"v".to_vec(), None).await;

        let report = mon.stats().await;
        assert!(report.remote_unavailable);
        assert!(report.alerts.iter().any(|a| a.kind == "remote_unavailable"));
    }

    #[tokio::test]
    async fn hit_ratio_is_unaffected_by_an_interleaved_set() {
        let mon = monitor();
        let cache = GenericCache::new(&CacheConfig::default(), None, mon.clone());

        let _ = cache.get("k").await.unwrap();
        cache.set("k", b"v".to_vec(), None).await.unwrap();
        let _ = cache.get("k").await.unwrap();

        let report = mon.stats().await;
        assert_eq!(report.hit_ratio, 0.5);
    }

    #[tokio::test]
    async fn clear_only_removes_namespaced_keys() {
        let config = CacheConfig {
            enable_l1_cache: false,
            ..CacheConfig::default()
        };
        let cache = GenericCache::new(&config, None, monitor());
        let remote = Arc::new(FakeRemoteClient::default());
        cache.set_remote_for_test(remote.clone()).await;

        cache.set("ai_cache:op:a", b"1".to_vec(), None).await.unwrap();
        remote.store.lock().unwrap().insert("other:unrelated".to_string(), b"2".to_vec());

        cache.clear().await.unwrap();

        assert_eq!(cache.get("ai_cache:op:a").await.unwrap(), None);
        assert!(remote.store.lock().unwrap().contains_key("other:unrelated"));
    }

    #[tokio::test]
    async fn callbacks_fire_on_hit_miss_and_set() {
        let mut cache = GenericCache::new(&CacheConfig::default(), None, monitor());
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));
        let sets = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        cache.register_get_success(Arc::new(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        let m = misses.clone();
        cache.register_get_miss(Arc::new(move |_, _| {
            m.fetch_add(1, Ordering::SeqCst);
        }));
        let s = sets.clone();
        cache.register_set_success(Arc::new(move |_, _, _| {
            s.fetch_add(1, Ordering::SeqCst);
        }));

        let _ = cache.get("absent").await.unwrap();
        cache.set("present", b"v".to_vec(), None).await.unwrap();
        let _ = cache.get("present").await.unwrap();

        assert_eq!(misses.load(Ordering::SeqCst), 1);
        assert_eq!(sets.load(Ordering::SeqCst), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_panicking_callback_does_not_break_the_operation() {
        let mut cache = GenericCache::new(&CacheConfig::default(), None, monitor());
        cache.register_get_miss(Arc::new(|_, _| panic!("boom")));
        let result = cache.get("nope").await;
        assert!(result.is_ok());
    }
}
