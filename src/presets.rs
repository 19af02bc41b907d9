//! Preset system (§4.8)
//!
//! A preset is a named, fully-formed configuration tuned for a deployment
//! scenario. The `disabled` preset is special: the factory reads its name
//! and returns a no-op cache rather than constructing a [`crate::generic_cache::GenericCache`]
//! from it (§9 open question: "treat `disabled` preset as a no-op cache").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{CacheConfig, TextSizeTiers};
use crate::errors::{CacheError, CacheResult};
use crate::strategies::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetName {
    Disabled,
    Simple,
    Development,
    Production,
    AiDevelopment,
    AiProduction,
}

impl PresetName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Disabled => "disabled",
            PresetName::Simple => "simple",
            PresetName::Development => "development",
            PresetName::Production => "production",
            PresetName::AiDevelopment => "ai-development",
            PresetName::AiProduction => "ai-production",
        }
    }

    pub fn all() -> [PresetName; 6] {
        [
            PresetName::Disabled,
            PresetName::Simple,
            PresetName::Development,
            PresetName::Production,
            PresetName::AiDevelopment,
            PresetName::AiProduction,
        ]
    }

    fn from_str(name: &str) -> Option<PresetName> {
        PresetName::all().into_iter().find(|p| p.as_str() == name)
    }
}

/// A named bundle of generic + AI + strategy settings.
#[derive(Debug, Clone)]
pub struct Preset {
    pub name: PresetName,
    pub strategy: Strategy,
    pub config: CacheConfig,
    pub description: &'static str,
}

/// Environment-based preset recommendation, with a confidence score and the
/// reasoning behind it (§4.8).
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub preset: PresetName,
    pub confidence: f64,
    pub reasoning: String,
}

/// Resolves preset names to fully-formed configurations and recommends one
/// from environment hints.
pub struct PresetManager;

impl PresetManager {
    pub fn new() -> Self {
        Self
    }

    pub fn get(&self, name: &str) -> CacheResult<Preset> {
        let parsed = PresetName::from_str(name)
            .ok_or_else(|| CacheError::ConfigurationInvalid(format!("preset '{name}' not found")))?;
        Ok(build_preset(parsed))
    }

    pub fn list(&self) -> Vec<Preset> {
        PresetName::all().iter().map(|&p| build_preset(p)).collect()
    }

    pub fn describe(&self, name: &str) -> CacheResult<&'static str> {
        self.get(name).map(|p| p.description)
    }

    /// Recommend a preset from an explicit environment selector, falling
    /// back to pattern matching against common environment variable values
    /// when `environment` is absent. Conflicting signals lower confidence.
    pub fn recommend(&self, environment: Option<&str>) -> Recommendation {
        let hint = environment.map(str::to_lowercase);

        let (preset, confidence, reasoning) = match hint.as_deref() {
            Some("production") | Some("prod") => (PresetName::Production, 0.9, "explicit 'production' environment hint".to_string()),
            Some("ai-production") | Some("ai_production") => {
                (PresetName::AiProduction, 0.9, "explicit AI production environment hint".to_string())
            }
            Some("development") | Some("dev") => {
                (PresetName::Development, 0.9, "explicit 'development' environment hint".to_string())
            }
            Some("ai-development") | Some("ai_development") => {
                (PresetName::AiDevelopment, 0.9, "explicit AI development environment hint".to_string())
            }
            Some("test") | Some("testing") | Some("ci") => {
                (PresetName::Simple, 0.7, format!("'{}' maps to the simple preset for test runs", hint.unwrap()))
            }
            Some(other) => (
                PresetName::Simple,
                0.3,
                format!("unrecognized environment '{other}'; defaulting to simple with low confidence"),
            ),
            None => (
                PresetName::Development,
                0.5,
                "no environment hint supplied; defaulting to development".to_string(),
            ),
        };

        Recommendation {
            preset,
            confidence,
            reasoning,
        }
    }
}

impl Default for PresetManager {
    fn default() -> Self {
        Self::new()
    }
}

fn build_preset(name: PresetName) -> Preset {
    let mut config = CacheConfig::default();
    let (strategy, description);

    match name {
        PresetName::Disabled => {
            strategy = Strategy::Fast;
            description = "no-op cache: every set succeeds trivially, every get misses";
            config.enable_l1_cache = false;
            config.redis_url = None;
        }
        PresetName::Simple => {
            strategy = Strategy::Balanced;
            description = "L1-only cache with moderate TTL, suited to a single-process deployment";
            config.redis_url = None;
            config.default_ttl = 1800;
            config.l1_cache_size = 500;
        }
        PresetName::Development => {
            strategy = Strategy::Fast;
            description = "short TTLs and no compression, favoring fast iteration over storage efficiency";
            config.redis_url = None;
            config.default_ttl = 300;
            config.compression_threshold = 1_048_576; // effectively never compresses
            config.fail_on_connection_error = false;
        }
        PresetName::Production => {
            strategy = Strategy::Robust;
            description = "longer TTLs and strong compression, tuned for durability over latency";
            config.default_ttl = 21_600;
            config.compression_threshold = 512;
            config.compression_level = 9;
            config.l1_cache_size = 5_000;
            config.fail_on_connection_error = false;
        }
        PresetName::AiDevelopment => {
            strategy = Strategy::AiOptimized;
            description = "AI workload tuning with short TTLs and verbose per-operation metrics, for local iteration";
            config.redis_url = None;
            config.default_ttl = 300;
            config.text_hash_threshold = 100;
            config.operation_ttls = default_operation_ttls();
        }
        PresetName::AiProduction => {
            strategy = Strategy::AiOptimized;
            description = "AI workload tuning with production-grade TTLs, compression, and remote storage";
            config.default_ttl = 3_600;
            config.compression_threshold = 512;
            config.compression_level = 9;
            config.l1_cache_size = 5_000;
            config.text_hash_threshold = 200;
            config.text_size_tiers = TextSizeTiers {
                small: 100,
                medium: 1_000,
                large: 10_000,
            };
            config.operation_ttls = default_operation_ttls();
        }
    }

    Preset {
        name,
        strategy,
        config,
        description,
    }
}

/// Stability-informed operation TTL defaults (§3 "encode stability
/// expectations") used by the two AI presets. Sentiment is stable and
/// long-lived; Q&A depends on conversational context and expires quickly.
fn default_operation_ttls() -> HashMap<String, u64> {
    let mut ttls = HashMap::new();
    ttls.insert("sentiment".to_string(), 86_400);
    ttls.insert("summarize".to_string(), 7_200);
    ttls.insert("key_points".to_string(), 7_200);
    ttls.insert("qa".to_string(), 1_800);
    ttls
}
