//! AI specialization (§4.7)
//!
//! Wraps the two-tier [`GenericCache`] with AI semantics: content-aware key
//! generation, per-operation TTL resolution, text-size tier classification
//! for metrics, and pattern invalidation. Implements [`Cache`] itself (as a
//! pass-through to the wrapped engine) so `Arc<AiCache>` still satisfies the
//! single contract every cache variant must honor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cache_trait::{Cache, CacheHealth};
use crate::config::{CacheConfig, TextSizeTiers};
use crate::errors::CacheResult;
use crate::generic_cache::GenericCache;
use crate::invalidation::{self, InvalidationOutcome};
use crate::key_generator::KeyGenerator;
use crate::monitor::{OperationKind, PerformanceMonitor};
use crate::remote::RemoteClient;

/// Text-length classification, used only for metrics segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTier {
    Small,
    Medium,
    Large,
    Xlarge,
}

fn classify(len: usize, tiers: &TextSizeTiers) -> TextTier {
    if len < tiers.small {
        TextTier::Small
    } else if len < tiers.medium {
        TextTier::Medium
    } else if len < tiers.large {
        TextTier::Large
    } else {
        TextTier::Xlarge
    }
}

/// Per-operation counts derived from the monitor's latency distributions.
#[derive(Debug, Clone, Serialize)]
pub struct OperationPerformance {
    pub operation: String,
    pub sample_count: u64,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub hit_ratio: f64,
}

/// AI-segmented performance summary (§4.7).
#[derive(Debug, Clone, Serialize)]
pub struct AiPerformanceSummary {
    pub overall_hit_ratio: f64,
    pub operations: Vec<OperationPerformance>,
}

/// Count of observed requests per text-size tier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TextTierStatistics {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
    pub xlarge: u64,
}

/// AI-aware wrapper over the two-tier engine.
pub struct AiCache {
    generic: Arc<GenericCache>,
    key_generator: KeyGenerator,
    operation_ttls: HashMap<String, u64>,
    default_ttl: Duration,
    text_size_tiers: TextSizeTiers,
    monitor: Arc<PerformanceMonitor>,
    /// Side-channel from `get_or_compute`/`set` callers to the registered
    /// monitor callback: a key's pending text length, consumed (and
    /// removed) the moment the callback fires. Short-lived by construction —
    /// entries never outlive a single operation.
    pending_text_length: Arc<DashMap<String, usize>>,
    tier_counts: Arc<TierCounts>,
}

#[derive(Default)]
struct TierCounts {
    small: AtomicUsize,
    medium: AtomicUsize,
    large: AtomicUsize,
    xlarge: AtomicUsize,
}

/// Hand-off from a synchronous engine callback to the async task that
/// actually records it on the monitor. The callback only does a
/// non-blocking dashmap removal and channel send — no `.await` inside a
/// sync `Fn`, and no race with `get_response` because the removal happens
/// synchronously before the engine's `get` call returns.
struct MetricEvent {
    operation: String,
    duration: Duration,
    hit: bool,
    text_length: usize,
}

impl AiCache {
    /// Wrap `generic` with AI semantics. Registers callbacks on the engine
    /// so every hit/miss/set carries an operation tag and text length
    /// through to the monitor without the engine needing AI awareness.
    pub fn new(generic: GenericCache, config: &CacheConfig, monitor: Arc<PerformanceMonitor>) -> Arc<Self> {
        let mut generic = generic;
        let pending_text_length: Arc<DashMap<String, usize>> = Arc::new(DashMap::new());
        let tier_counts = Arc::new(TierCounts::default());

        let (tx, mut rx) = mpsc::unbounded_channel::<MetricEvent>();
        let mon = monitor.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                mon.record_operation(&event.operation, event.duration, event.hit, event.text_length).await;
            }
        });

        let pending = pending_text_length.clone();
        let sender = tx.clone();
        generic.register_get_success(Arc::new(move |key, duration| {
            let text_length = pending.remove(key).map(|(_, v)| v).unwrap_or(0);
            let _ = sender.send(MetricEvent {
                operation: operation_from_key(key).to_string(),
                duration,
                hit: true,
                text_length,
            });
        }));

        let pending = pending_text_length.clone();
        let sender = tx;
        generic.register_get_miss(Arc::new(move |key, duration| {
            let text_length = pending.remove(key).map(|(_, v)| v).unwrap_or(0);
            let _ = sender.send(MetricEvent {
                operation: operation_from_key(key).to_string(),
                duration,
                hit: false,
                text_length,
            });
        }));

        // Text-tier counting happens in `set_response`, which has the actual
        // text length on hand. A `set_success` callback here would only see
        // the serialized/compressed payload's byte length — not the
        // original text — and would double-count every AI-tagged set.

        Arc::new(Self {
            generic: Arc::new(generic),
            key_generator: KeyGenerator::new(config.text_hash_threshold, config.hash_algorithm),
            operation_ttls: config.operation_ttls.clone(),
            default_ttl: Duration::from_secs(config.default_ttl),
            text_size_tiers: config.text_size_tiers,
            monitor,
            pending_text_length,
            tier_counts,
        })
    }

    pub async fn connect(&self) -> CacheResult<()> {
        self.generic.connect().await
    }

    /// Build the deterministic key for `(text, operation, options)`.
    pub fn build_key(&self, text: &str, operation: &str, options: &Value) -> String {
        self.key_generator.build_key(text, operation, options)
    }

    /// Build the key while timing the call into a `key_generation` operation
    /// record, so the §4.4 100ms key-gen slow-op floor has something to
    /// apply against.
    async fn build_key_timed(&self, text: &str, operation: &str, options: &Value) -> String {
        let start = Instant::now();
        let key = self.build_key(text, operation, options);
        self.monitor
            .record_operation_kind("key_generation", start.elapsed(), true, text.chars().count(), OperationKind::Other)
            .await;
        key
    }

    /// Fetch a cached response for an AI operation, recording text length on
    /// the side-channel so the registered callback can tag the monitor
    /// record with it.
    pub async fn get_response(&self, text: &str, operation: &str, options: &Value) -> CacheResult<Option<Vec<u8>>> {
        let key = self.build_key_timed(text, operation, options).await;
        self.pending_text_length.insert(key.clone(), text.chars().count());
        let result = self.generic.get(&key).await;
        self.pending_text_length.remove(&key);
        result
    }

    /// Store a cached response for an AI operation, resolving its TTL from
    /// `operation_ttls[operation]` (falling back to `default_ttl`).
    pub async fn set_response(&self, text: &str, operation: &str, options: &Value, value: Vec<u8>) -> CacheResult<()> {
        let key = self.build_key_timed(text, operation, options).await;
        let ttl = self.resolve_ttl(operation);
        let tier = classify(text.chars().count(), &self.text_size_tiers);
        match tier {
            TextTier::Small => self.tier_counts.small.fetch_add(1, Ordering::Relaxed),
            TextTier::Medium => self.tier_counts.medium.fetch_add(1, Ordering::Relaxed),
            TextTier::Large => self.tier_counts.large.fetch_add(1, Ordering::Relaxed),
            TextTier::Xlarge => self.tier_counts.xlarge.fetch_add(1, Ordering::Relaxed),
        };
        self.generic.set(&key, value, Some(ttl)).await
    }

    /// TTL for `operation`, falling through to `default_ttl` for unknown
    /// operations (§4.7 "Per-operation TTL resolution").
    pub fn resolve_ttl(&self, operation: &str) -> Duration {
        self.operation_ttls
            .get(operation)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(self.default_ttl)
    }

    /// Remove every cached entry whose key contains `pattern`, in both tiers.
    /// L1 has no scan primitive of its own, so its (small, in-process) key
    /// set is matched directly against the same pattern used for the remote
    /// sweep; without this a pattern-invalidated key would still be served
    /// from L1 until its TTL happened to expire.
    pub async fn invalidate_pattern(&self, pattern: &str, reason: &str) -> CacheResult<InvalidationOutcome> {
        let matcher = invalidation::compile_pattern(pattern);
        for key in self.generic.l1_keys() {
            if matcher.is_match(&key) {
                self.generic.l1_delete(&key);
            }
        }

        let remote = self.generic_remote().await;
        match remote {
            Some(client) => invalidation::invalidate_pattern(client.as_ref(), &self.monitor, pattern, reason).await,
            None => Ok(InvalidationOutcome {
                keys_removed: 0,
                partial: false,
            }),
        }
    }

    /// Shorthand: invalidate every key produced for a single operation.
    pub async fn invalidate_by_operation(&self, operation: &str, reason: &str) -> CacheResult<InvalidationOutcome> {
        self.invalidate_pattern(&invalidation::pattern_for_operation(operation), reason).await
    }

    pub async fn get_ai_performance_summary(&self) -> AiPerformanceSummary {
        let report = self.monitor.stats().await;
        let operations = report
            .latency_by_operation
            .iter()
            .map(|(op, dist)| OperationPerformance {
                operation: op.clone(),
                sample_count: dist.count as u64,
                mean_ms: dist.mean_ms,
                p95_ms: dist.p95_ms,
                hit_ratio: report.hit_ratio,
            })
            .collect();

        AiPerformanceSummary {
            overall_hit_ratio: report.hit_ratio,
            operations,
        }
    }

    pub fn get_text_tier_statistics(&self) -> TextTierStatistics {
        TextTierStatistics {
            small: self.tier_counts.small.load(Ordering::Relaxed) as u64,
            medium: self.tier_counts.medium.load(Ordering::Relaxed) as u64,
            large: self.tier_counts.large.load(Ordering::Relaxed) as u64,
            xlarge: self.tier_counts.xlarge.load(Ordering::Relaxed) as u64,
        }
    }

    pub async fn get_operation_performance(&self, operation: &str) -> Option<OperationPerformance> {
        let report = self.monitor.stats().await;
        report.latency_by_operation.get(operation).map(|dist| OperationPerformance {
            operation: operation.to_string(),
            sample_count: dist.count as u64,
            mean_ms: dist.mean_ms,
            p95_ms: dist.p95_ms,
            hit_ratio: report.hit_ratio,
        })
    }

    async fn generic_remote(&self) -> Option<Arc<dyn RemoteClient>> {
        self.generic.remote_handle().await
    }

    #[cfg(test)]
    pub async fn set_remote_for_test(&self, client: Arc<dyn RemoteClient>) {
        self.generic.set_remote_for_test(client).await;
    }
}

/// Recover the operation name embedded in a key of the form
/// `ai_cache:op:{operation}|...`, so the monitor can be tagged with it from
/// inside a callback that only sees the raw key.
fn operation_from_key(key: &str) -> &str {
    key.strip_prefix("ai_cache:op:")
        .and_then(|rest| rest.split('|').next())
        .unwrap_or("unknown")
}

#[async_trait]
impl Cache for AiCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.generic.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.generic.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.generic.delete(key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.generic.exists(key).await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.generic.clear().await
    }

    async fn ping(&self) -> CacheHealth {
        self.generic.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_support::FakeRemoteClient;
    use serde_json::json;

    fn monitor() -> Arc<PerformanceMonitor> {
        Arc::new(PerformanceMonitor::new(Default::default()))
    }

    fn ai_cache(config: &CacheConfig) -> Arc<AiCache> {
        let generic = GenericCache::new(config, None, monitor());
        AiCache::new(generic, config, monitor())
    }

    #[tokio::test]
    async fn per_operation_ttl_falls_back_to_default() {
        let mut config = CacheConfig::default();
        config.operation_ttls.insert("sentiment".to_string(), 7200);
        let cache = ai_cache(&config);

        assert_eq!(cache.resolve_ttl("sentiment"), Duration::from_secs(7200));
        assert_eq!(cache.resolve_ttl("unlisted_operation"), Duration::from_secs(config.default_ttl));
    }

    #[tokio::test]
    async fn small_text_cold_then_warm_raises_hit_ratio() {
        let cache = ai_cache(&CacheConfig::default());
        let text = "Hello world.";
        let options = json!({"max_length": 100});

        let miss = cache.get_response(text, "summarize", &options).await.unwrap();
        assert!(miss.is_none());

        cache
            .set_response(text, "summarize", &options, br#"{"summary":"Hello."}"#.to_vec())
            .await
            .unwrap();

        let hit = cache.get_response(text, "summarize", &options).await.unwrap();
        assert_eq!(hit, Some(br#"{"summary":"Hello."}"#.to_vec()));
    }

    #[tokio::test]
    async fn qa_requests_differ_by_question_alone() {
        let cache = ai_cache(&CacheConfig::default());
        let key1 = cache.build_key("document text", "qa", &json!({"question": "What is X?"}));
        let key2 = cache.build_key("document text", "qa", &json!({"question": "What is Y?"}));
        assert_ne!(key1, key2);
    }

    #[tokio::test]
    async fn invalidate_by_operation_only_removes_that_operations_keys() {
        let config = CacheConfig::default();
        let cache = ai_cache(&config);
        cache.set_remote_for_test(Arc::new(FakeRemoteClient::default())).await;

        cache
            .set_response("doc", "summarize", &json!({}), b"a".to_vec())
            .await
            .unwrap();
        cache
            .set_response("doc", "sentiment", &json!({}), b"b".to_vec())
            .await
            .unwrap();

        let outcome = cache.invalidate_by_operation("summarize", "manual test").await.unwrap();
        assert_eq!(outcome.keys_removed, 1);

        assert!(cache
            .get_response("doc", "sentiment", &json!({}))
            .await
            .unwrap()
            .is_some());
        assert!(cache
            .get_response("doc", "summarize", &json!({}))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn text_tier_statistics_count_observed_sets() {
        let cache = ai_cache(&CacheConfig::default());
        cache.set_response("short", "summarize", &json!({}), b"v".to_vec()).await.unwrap();
        let stats = cache.get_text_tier_statistics();
        assert_eq!(stats.small + stats.medium + stats.large + stats.xlarge, 1);
    }

    #[tokio::test]
    async fn key_generation_is_recorded_as_its_own_operation() {
        let mon = monitor();
        let generic = GenericCache::new(&CacheConfig::default(), None, mon.clone());
        let cache = AiCache::new(generic, &CacheConfig::default(), mon.clone());

        let _ = cache.get_response("doc", "summarize", &json!({})).await.unwrap();
        cache.set_response("doc", "summarize", &json!({}), b"v".to_vec()).await.unwrap();

        let report = mon.stats().await;
        assert!(report.latency_by_operation.contains_key("key_generation"));
        assert_eq!(report.latency_by_operation["key_generation"].count, 2);
    }
}
