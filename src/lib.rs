//! Two-tier AI response cache.
//!
//! An in-process L1 (bounded, TTL + approximate-LRU) layered over a remote
//! L2 store, with an AI specialization built by composition on top of a
//! generic two-tier engine rather than by inheritance. See the module docs
//! for the split: [`generic_cache`] is storage-and-transport; [`ai_cache`]
//! adds content-aware keys, per-operation TTLs, and text-tier metrics.
//!
//! [`CacheFactory`] at the bottom of this file is the intended entry point
//! for most callers — it resolves a preset or configuration down to a
//! ready-to-use `Arc<dyn Cache>` without exposing which concrete engine is
//! behind it.

pub mod ai_cache;
pub mod cache_trait;
pub mod compression;
pub mod config;
pub mod errors;
pub mod generic_cache;
pub mod invalidation;
pub mod key_generator;
pub mod l1_memory;
pub mod monitor;
pub mod parameter_mapper;
pub mod presets;
pub mod remote;
pub mod security;
pub mod serialization;
pub mod strategies;
pub mod validator;
pub mod warming;

pub use ai_cache::{AiCache, AiPerformanceSummary, OperationPerformance, TextTier, TextTierStatistics};
pub use cache_trait::{Cache, CacheHealth, NAMESPACE};
pub use compression::{CacheCompressor, CompressionEfficiency, CompressionStats};
pub use config::{CacheConfig, ConfigOverrides, TextSizeTiers};
pub use errors::{CacheError, CacheResult};
pub use generic_cache::GenericCache;
pub use invalidation::InvalidationOutcome;
pub use key_generator::{HashAlgorithm, KeyGenerator};
pub use l1_memory::{MemoryCache, MemoryCacheConfig, MemoryCacheStats};
pub use monitor::{MonitorConfig, MonitorReport, OperationKind, PerformanceMonitor};
pub use parameter_mapper::{MappingResult, ParameterMapper};
pub use presets::{Preset, PresetManager, PresetName, Recommendation};
pub use remote::{RedisRemoteClient, RemoteClient};
pub use security::{PassthroughSecurityAdapter, SecurityAdapter, SecurityLevel};
pub use serialization::{CacheSerializer, SerializationConfig, SerializationFormat};
pub use strategies::Strategy;
pub use validator::{ValidationReport, Validator};
pub use warming::{CacheWarmer, WarmingReport, WarmingStrategy};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Cache that never retains anything: every `set` succeeds trivially, every
/// `get` misses. Returned for the `disabled` preset (§9 open question,
/// resolved in `presets.rs`) so callers that wire a cache in unconditionally
/// don't need a feature flag to turn it off.
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn clear(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn ping(&self) -> CacheHealth {
        CacheHealth::Healthy
    }
}

/// Which backing store a `for_testing` cache should actually touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestingBackend {
    /// L1 only, no remote — the default for unit tests.
    Memory,
    /// A real Redis connection, for integration tests that need L2 behavior.
    Redis,
}

/// Resolves a preset, configuration, or raw parameter dict down to a
/// ready-to-use cache, hiding which concrete engine (`NoopCache`,
/// `GenericCache`, or `AiCache`) backs the returned trait object (§4.9).
pub struct CacheFactory;

impl CacheFactory {
    /// A cache tuned for a plain web application: no AI specialization, the
    /// `simple` preset as a base.
    pub async fn for_web_app(redis_url: Option<&str>, overrides: Option<ConfigOverrides>) -> CacheResult<Arc<dyn Cache>> {
        Self::from_preset(PresetName::Simple.as_str(), redis_url, overrides).await
    }

    /// A cache tuned for AI workloads: the `ai-production` preset as a base,
    /// always wrapped with [`AiCache`] regardless of what the merged
    /// configuration's `operation_ttls` ends up containing.
    pub async fn for_ai_app(redis_url: Option<&str>, overrides: Option<ConfigOverrides>) -> CacheResult<Arc<dyn Cache>> {
        Self::from_preset(PresetName::AiProduction.as_str(), redis_url, overrides).await
    }

    /// A cache for tests: L1-only by default, or a real Redis connection
    /// when `backend` is `Redis`. `fail_on_connection_error` is exposed
    /// directly so a test can assert on `CacheUnavailable` without building
    /// a whole `CacheConfig`.
    pub async fn for_testing(
        backend: TestingBackend,
        redis_url: Option<&str>,
        fail_on_connection_error: bool,
    ) -> CacheResult<Arc<dyn Cache>> {
        let mut config = PresetManager::new().get(PresetName::Simple.as_str())?.config;
        config.fail_on_connection_error = fail_on_connection_error;
        config.redis_url = match backend {
            TestingBackend::Memory => None,
            TestingBackend::Redis => redis_url.map(str::to_string),
        };

        Self::from_validated_config(config, false).await
    }

    /// Resolve an already-constructed configuration directly, bypassing the
    /// preset system. AI specialization is applied automatically whenever
    /// the configuration carries at least one per-operation TTL — callers
    /// who want AI semantics on a config with an empty `operation_ttls`
    /// table should populate it first, even with a single entry.
    pub async fn create_from_config(config: CacheConfig) -> CacheResult<Arc<dyn Cache>> {
        let wants_ai = !config.operation_ttls.is_empty();
        Self::from_validated_config(config, wants_ai).await
    }

    /// Resolve a named preset (§4.8), applying `redis_url` and `overrides`
    /// on top of it. The `disabled` preset short-circuits to [`NoopCache`]
    /// before any validation or connection attempt runs.
    pub async fn from_preset(
        name: &str,
        redis_url: Option<&str>,
        overrides: Option<ConfigOverrides>,
    ) -> CacheResult<Arc<dyn Cache>> {
        let preset = PresetManager::new().get(name)?;
        if preset.name == PresetName::Disabled {
            return Ok(Arc::new(NoopCache));
        }

        let mut overrides = overrides.unwrap_or_default();
        if let Some(url) = redis_url {
            overrides.redis_url = Some(url.to_string());
        }
        let config = preset.config.merge(&overrides);
        let wants_ai = matches!(preset.name, PresetName::AiDevelopment | PresetName::AiProduction);

        Self::from_validated_config(config, wants_ai).await
    }

    /// Shared tail of every public constructor: validate, connect, and wrap
    /// with AI semantics if requested.
    async fn from_validated_config(config: CacheConfig, wants_ai: bool) -> CacheResult<Arc<dyn Cache>> {
        let report = Validator::new().validate_config(&config);
        for warning in &report.warnings {
            tracing::warn!(%warning, "cache configuration warning");
        }
        if !report.is_valid {
            return Err(CacheError::ConfigurationInvalid(report.errors.join("; ")));
        }

        let monitor = Arc::new(PerformanceMonitor::new(MonitorConfig::default()));
        let generic = GenericCache::new(&config, None, monitor.clone());
        generic.connect().await?;

        if wants_ai {
            Ok(AiCache::new(generic, &config, monitor) as Arc<dyn Cache>)
        } else {
            Ok(Arc::new(generic) as Arc<dyn Cache>)
        }
    }
}
