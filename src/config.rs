//! Cache configuration
//!
//! `CacheConfig` is the single configuration record used throughout the
//! crate (generic cache parameters and AI-specific parameters live side by
//! side in one struct rather than as two overlapping dataclasses — the
//! retrieval pack this crate was built from carried more than one
//! configuration shape for historical reasons; this consolidates to one).
//! It is validated once at construction and treated as immutable afterward.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CacheError, CacheResult};
use crate::key_generator::HashAlgorithm;

pub const DEFAULT_TTL_RANGE: (u64, u64) = (1, 31_536_000);
pub const COMPRESSION_THRESHOLD_RANGE: (usize, usize) = (0, 1_048_576);
pub const TEXT_HASH_THRESHOLD_RANGE: (usize, usize) = (1, 100_000);
pub const L1_CACHE_SIZE_RANGE: (usize, usize) = (1, 10_000);

/// Ordered character-count thresholds used to classify text length into a
/// metrics tier. `small < medium < large` is enforced by `validate()`;
/// anything at or above `large` is the `xlarge` tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSizeTiers {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

impl Default for TextSizeTiers {
    fn default() -> Self {
        Self {
            small: 100,
            medium: 1_000,
            large: 10_000,
        }
    }
}

/// Full cache configuration: generic two-tier parameters plus the
/// AI-specific overlay. Construct through `CacheConfig::default()` (or a
/// preset), apply overrides with `merge`, then call `validate()` — after
/// that the record should not be mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    // Generic parameters (spec §3 "Generic")
    pub redis_url: Option<String>,
    pub default_ttl: u64,
    pub enable_l1_cache: bool,
    pub l1_cache_size: usize,
    pub compression_threshold: usize,
    pub compression_level: u32,
    pub fail_on_connection_error: bool,
    pub security_config: Option<Value>,

    // AI-specific parameters (spec §3 "AI-specific")
    pub text_hash_threshold: usize,
    pub hash_algorithm: HashAlgorithm,
    pub text_size_tiers: TextSizeTiers,
    pub operation_ttls: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            default_ttl: 3600,
            enable_l1_cache: true,
            l1_cache_size: 1000,
            compression_threshold: 1024,
            compression_level: 6,
            fail_on_connection_error: false,
            security_config: None,
            text_hash_threshold: 200,
            hash_algorithm: HashAlgorithm::default(),
            text_size_tiers: TextSizeTiers::default(),
            operation_ttls: HashMap::new(),
        }
    }
}

/// Partial set of fields used to overlay call-site overrides or a custom
/// JSON payload onto a preset without forcing every field to be restated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub redis_url: Option<String>,
    pub default_ttl: Option<u64>,
    pub enable_l1_cache: Option<bool>,
    pub l1_cache_size: Option<usize>,
    pub compression_threshold: Option<usize>,
    pub compression_level: Option<u32>,
    pub fail_on_connection_error: Option<bool>,
    pub security_config: Option<Value>,
    pub text_hash_threshold: Option<usize>,
    pub hash_algorithm: Option<HashAlgorithm>,
    pub text_size_tiers: Option<TextSizeTiers>,
    pub operation_ttls: Option<HashMap<String, u64>>,
    /// Legacy alias for `l1_cache_size` (spec §3 "legacy alias").
    pub memory_cache_size: Option<usize>,
}

impl CacheConfig {
    /// Check numeric ranges and cross-field constraints (spec §3, §4.5).
    pub fn validate(&self) -> CacheResult<()> {
        let mut errors = Vec::new();

        if !(DEFAULT_TTL_RANGE.0..=DEFAULT_TTL_RANGE.1).contains(&self.default_ttl) {
            errors.push(format!(
                "default_ttl {} outside allowed range {}..={}",
                self.default_ttl, DEFAULT_TTL_RANGE.0, DEFAULT_TTL_RANGE.1
            ));
        }
        if !(COMPRESSION_THRESHOLD_RANGE.0..=COMPRESSION_THRESHOLD_RANGE.1).contains(&self.compression_threshold) {
            errors.push(format!(
                "compression_threshold {} outside allowed range {}..={}",
                self.compression_threshold, COMPRESSION_THRESHOLD_RANGE.0, COMPRESSION_THRESHOLD_RANGE.1
            ));
        }
        if !(1..=9).contains(&self.compression_level) {
            errors.push(format!("compression_level {} outside allowed range 1..=9", self.compression_level));
        }
        if !(TEXT_HASH_THRESHOLD_RANGE.0..=TEXT_HASH_THRESHOLD_RANGE.1).contains(&self.text_hash_threshold) {
            errors.push(format!(
                "text_hash_threshold {} outside allowed range {}..={}",
                self.text_hash_threshold, TEXT_HASH_THRESHOLD_RANGE.0, TEXT_HASH_THRESHOLD_RANGE.1
            ));
        }
        if !(L1_CACHE_SIZE_RANGE.0..=L1_CACHE_SIZE_RANGE.1).contains(&self.l1_cache_size) {
            errors.push(format!(
                "l1_cache_size {} outside allowed range {}..={}",
                self.l1_cache_size, L1_CACHE_SIZE_RANGE.0, L1_CACHE_SIZE_RANGE.1
            ));
        }
        let tiers = &self.text_size_tiers;
        if !(tiers.small < tiers.medium && tiers.medium < tiers.large) {
            errors.push(format!(
                "text_size_tiers must satisfy small < medium < large, got {} < {} < {}",
                tiers.small, tiers.medium, tiers.large
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CacheError::ConfigurationInvalid(errors.join("; ")))
        }
    }

    /// Overlay `overrides` onto this configuration, producing a new record.
    /// The legacy `memory_cache_size` alias is applied before `l1_cache_size`
    /// so an explicit `l1_cache_size` override always wins if both are set.
    pub fn merge(&self, overrides: &ConfigOverrides) -> CacheConfig {
        let mut merged = self.clone();

        if let Some(v) = overrides.memory_cache_size {
            merged.l1_cache_size = v;
        }
        if let Some(v) = &overrides.redis_url {
            merged.redis_url = Some(v.clone());
        }
        if let Some(v) = overrides.default_ttl {
            merged.default_ttl = v;
        }
        if let Some(v) = overrides.enable_l1_cache {
            merged.enable_l1_cache = v;
        }
        if let Some(v) = overrides.l1_cache_size {
            merged.l1_cache_size = v;
        }
        if let Some(v) = overrides.compression_threshold {
            merged.compression_threshold = v;
        }
        if let Some(v) = overrides.compression_level {
            merged.compression_level = v;
        }
        if let Some(v) = overrides.fail_on_connection_error {
            merged.fail_on_connection_error = v;
        }
        if let Some(v) = &overrides.security_config {
            merged.security_config = Some(v.clone());
        }
        if let Some(v) = overrides.text_hash_threshold {
            merged.text_hash_threshold = v;
        }
        if let Some(v) = overrides.hash_algorithm {
            merged.hash_algorithm = v;
        }
        if let Some(v) = overrides.text_size_tiers {
            merged.text_size_tiers = v;
        }
        if let Some(v) = &overrides.operation_ttls {
            merged.operation_ttls = v.clone();
        }

        merged
    }

    /// The generic (non-AI) parameter subset, as used by the two-tier engine.
    pub fn to_generic_params(&self) -> HashMap<String, Value> {
        let mut params = HashMap::new();
        params.insert("redis_url".to_string(), serde_json::to_value(&self.redis_url).unwrap());
        params.insert("default_ttl".to_string(), Value::from(self.default_ttl));
        params.insert("enable_l1_cache".to_string(), Value::from(self.enable_l1_cache));
        params.insert("l1_cache_size".to_string(), Value::from(self.l1_cache_size));
        params.insert("compression_threshold".to_string(), Value::from(self.compression_threshold));
        params.insert("compression_level".to_string(), Value::from(self.compression_level));
        params.insert("fail_on_connection_error".to_string(), Value::from(self.fail_on_connection_error));
        params.insert(
            "security_config".to_string(),
            self.security_config.clone().unwrap_or(Value::Null),
        );
        params
    }

    /// The AI-specific parameter subset, as used by the AI cache overlay.
    pub fn to_ai_params(&self) -> HashMap<String, Value> {
        let mut params = HashMap::new();
        params.insert("text_hash_threshold".to_string(), Value::from(self.text_hash_threshold));
        params.insert("hash_algorithm".to_string(), serde_json::to_value(self.hash_algorithm).unwrap());
        params.insert("text_size_tiers".to_string(), serde_json::to_value(self.text_size_tiers).unwrap());
        params.insert("operation_ttls".to_string(), serde_json::to_value(&self.operation_ttls).unwrap());
        params
    }

    pub fn to_dict(&self) -> CacheResult<Value> {
        serde_json::to_value(self).map_err(CacheError::from)
    }

    pub fn from_dict(value: &Value) -> CacheResult<CacheConfig> {
        serde_json::from_value(value.clone()).map_err(CacheError::from)
    }

    /// Load configuration from environment variables under `prefix`, e.g.
    /// `prefix="AI_CACHE"` reads `AI_CACHE__DEFAULT_TTL`, following the same
    /// `config` crate pattern used for the rest of this codebase's settings.
    pub fn from_env(prefix: &str) -> CacheResult<CacheConfig> {
        let defaults = serde_json::to_value(CacheConfig::default())?;
        let built = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(CacheError::from)?)
            .add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(CacheError::from)?;

        built.try_deserialize().map_err(CacheError::from)
    }

    /// Load configuration from a file (JSON, TOML, or YAML, detected by
    /// extension), overlaying environment variables under `prefix` if given.
    pub fn from_file(path: impl AsRef<Path>, prefix: Option<&str>) -> CacheResult<CacheConfig> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&serde_json::to_value(CacheConfig::default())?).map_err(CacheError::from)?)
            .add_source(config::File::from(path.as_ref()));

        if let Some(prefix) = prefix {
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        builder.build().map_err(CacheError::from)?.try_deserialize().map_err(CacheError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        let config = CacheConfig {
            default_ttl: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::ConfigurationInvalid(_))));
    }

    #[test]
    fn non_monotonic_tiers_are_rejected() {
        let config = CacheConfig {
            text_size_tiers: TextSizeTiers {
                small: 500,
                medium: 100,
                large: 1000,
            },
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn memory_cache_size_alias_maps_to_l1_cache_size() {
        let overrides = ConfigOverrides {
            memory_cache_size: Some(42),
            ..ConfigOverrides::default()
        };
        let merged = CacheConfig::default().merge(&overrides);
        assert_eq!(merged.l1_cache_size, 42);
    }

    #[test]
    fn explicit_l1_cache_size_override_wins_over_alias() {
        let overrides = ConfigOverrides {
            memory_cache_size: Some(42),
            l1_cache_size: Some(99),
            ..ConfigOverrides::default()
        };
        let merged = CacheConfig::default().merge(&overrides);
        assert_eq!(merged.l1_cache_size, 99);
    }

    #[test]
    fn from_dict_of_to_dict_round_trips_for_a_validated_config() {
        let config = CacheConfig::default();
        let dict = config.to_dict().unwrap();
        let restored = CacheConfig::from_dict(&dict).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn merging_a_config_with_itself_is_idempotent() {
        let config = CacheConfig::default();
        let overrides = ConfigOverrides {
            default_ttl: Some(config.default_ttl),
            ..ConfigOverrides::default()
        };
        let merged_once = config.merge(&overrides);
        let merged_twice = merged_once.merge(&overrides);
        assert_eq!(merged_once, merged_twice);
    }
}
