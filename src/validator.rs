//! Config/preset/override validator and templates (§4.8)
//!
//! Applies schema-like rules beyond what `CacheConfig::validate` already
//! enforces (range + monotonicity checks) — this layer adds advisory
//! warnings and info messages so factory callers get actionable feedback
//! rather than a bare pass/fail.

use crate::config::{CacheConfig, ConfigOverrides};
use crate::presets::{Preset, PresetManager};

/// Outcome of a validation pass: unlike `CacheResult`, this never short
/// circuits — it collects everything wrong (or merely worth mentioning)
/// and lets the caller decide.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl ValidationReport {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
    fn note(&mut self, message: impl Into<String>) {
        self.info.push(message.into());
    }
}

pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a fully-formed configuration: range/monotonicity checks plus
    /// advisory warnings about combinations that are legal but likely wrong.
    pub fn validate_config(&self, config: &CacheConfig) -> ValidationReport {
        let mut report = ValidationReport::default();

        if let Err(e) = config.validate() {
            report.error(e.to_string());
        }

        if config.redis_url.is_none() && config.fail_on_connection_error {
            report.warn("fail_on_connection_error has no effect without a redis_url; there is nothing to fail to connect to");
        }
        if !config.enable_l1_cache && config.redis_url.is_none() {
            report.warn("L1 disabled and no redis_url configured; this cache will never retain anything");
        }
        if config.compression_threshold == 0 && config.redis_url.is_some() {
            report.note("compression_threshold of 0 compresses every remote write, including tiny payloads");
        }
        if config.l1_cache_size < 10 {
            report.note("l1_cache_size is very small; eviction pressure will be high under concurrent load");
        }

        report.is_valid = report.errors.is_empty();
        report
    }

    pub fn validate_preset(&self, preset: &Preset) -> ValidationReport {
        self.validate_config(&preset.config)
    }

    /// Validate a partial override set in isolation — most fields have no
    /// meaningful range check until merged onto a base config, but a few
    /// (compression level, TTL) can be checked standalone.
    pub fn validate_overrides(&self, overrides: &ConfigOverrides) -> ValidationReport {
        let mut report = ValidationReport::default();

        if let Some(level) = overrides.compression_level {
            if !(1..=9).contains(&level) {
                report.error(format!("compression_level override {level} outside 1..=9"));
            }
        }
        if let Some(ttl) = overrides.default_ttl {
            if ttl == 0 {
                report.error("default_ttl override of 0 would expire entries immediately");
            }
        }
        if let (Some(l1), Some(mem)) = (overrides.l1_cache_size, overrides.memory_cache_size) {
            if l1 != mem {
                report.warn(format!(
                    "both l1_cache_size ({l1}) and its legacy alias memory_cache_size ({mem}) were set with different values; l1_cache_size wins"
                ));
            }
        }

        report.is_valid = report.errors.is_empty();
        report
    }

    /// A named, ready-to-use configuration for a common bootstrapping
    /// scenario, distinct from the formal presets in `presets.rs` in that
    /// these are meant as editable starting points rather than deployment
    /// targets.
    pub fn template(&self, name: &str) -> Option<CacheConfig> {
        let manager = PresetManager::new();
        match name {
            "fast_development" => manager.get("development").ok().map(|p| p.config),
            "robust_production" => manager.get("production").ok().map(|p| p.config),
            _ => None,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
