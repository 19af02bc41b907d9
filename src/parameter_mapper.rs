//! Parameter mapper (§4.5)
//!
//! Separates a loosely-typed configuration dict into the generic subset and
//! the AI-specific subset, resolving legacy aliases and catching unknown
//! keys before they reach `CacheConfig::validate`.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{CacheConfig, ConfigOverrides};

const GENERIC_KEYS: &[&str] = &[
    "redis_url",
    "default_ttl",
    "enable_l1_cache",
    "l1_cache_size",
    "compression_threshold",
    "compression_level",
    "fail_on_connection_error",
    "security_config",
];

const AI_KEYS: &[&str] = &["text_hash_threshold", "hash_algorithm", "text_size_tiers", "operation_ttls"];

/// Maps a legacy/alternate key to its canonical name and destination group.
const ALIASES: &[(&str, &str)] = &[("memory_cache_size", "l1_cache_size")];

/// Outcome of routing and validating a raw parameter dict.
#[derive(Debug, Clone, Default)]
pub struct MappingResult {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub generic: HashMap<String, Value>,
    pub ai: HashMap<String, Value>,
}

/// Routes raw key/value pairs to the generic or AI-specific subset, applying
/// aliases and rejecting unknown keys.
pub struct ParameterMapper;

impl ParameterMapper {
    pub fn new() -> Self {
        Self
    }

    /// Classify and validate a flat parameter dict. Unknown keys are errors
    /// rather than silently ignored, per §4.5.
    pub fn map(&self, raw: &HashMap<String, Value>) -> MappingResult {
        let mut result = MappingResult::default();

        for (key, value) in raw {
            let canonical = ALIASES
                .iter()
                .find(|(alias, _)| alias == key)
                .map(|(_, target)| *target)
                .unwrap_or(key.as_str());

            if canonical != key.as_str() {
                result
                    .warnings
                    .push(format!("'{key}' is a legacy alias for '{canonical}'; prefer the canonical name"));
            }

            if GENERIC_KEYS.contains(&canonical) {
                result.generic.insert(canonical.to_string(), value.clone());
            } else if AI_KEYS.contains(&canonical) {
                result.ai.insert(canonical.to_string(), value.clone());
            } else {
                result.errors.push(format!("unrecognized configuration key '{key}'"));
            }
        }

        self.validate_ranges(&result.generic, &mut result.errors);
        self.validate_ranges(&result.ai, &mut result.errors);
        self.validate_cross_field(&result.ai, &mut result.errors, &mut result.recommendations);

        result.ok = result.errors.is_empty();
        result
    }

    /// Build a `ConfigOverrides` from a mapped result, for callers that want
    /// to merge onto a preset rather than build a config from scratch.
    pub fn to_overrides(&self, result: &MappingResult) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::default();
        let merged: HashMap<&String, &Value> = result.generic.iter().chain(result.ai.iter()).collect();

        for (key, value) in merged {
            match key.as_str() {
                "redis_url" => overrides.redis_url = value.as_str().map(str::to_string),
                "default_ttl" => overrides.default_ttl = value.as_u64(),
                "enable_l1_cache" => overrides.enable_l1_cache = value.as_bool(),
                "l1_cache_size" => overrides.l1_cache_size = value.as_u64().map(|v| v as usize),
                "compression_threshold" => overrides.compression_threshold = value.as_u64().map(|v| v as usize),
                "compression_level" => overrides.compression_level = value.as_u64().map(|v| v as u32),
                "fail_on_connection_error" => overrides.fail_on_connection_error = value.as_bool(),
                "security_config" => overrides.security_config = Some(value.clone()),
                "text_hash_threshold" => overrides.text_hash_threshold = value.as_u64().map(|v| v as usize),
                "hash_algorithm" => overrides.hash_algorithm = serde_json::from_value(value.clone()).ok(),
                "text_size_tiers" => overrides.text_size_tiers = serde_json::from_value(value.clone()).ok(),
                "operation_ttls" => overrides.operation_ttls = serde_json::from_value(value.clone()).ok(),
                _ => {}
            }
        }

        overrides
    }

    fn validate_ranges(&self, params: &HashMap<String, Value>, errors: &mut Vec<String>) {
        if let Some(v) = params.get("default_ttl").and_then(Value::as_u64) {
            if !(crate::config::DEFAULT_TTL_RANGE.0..=crate::config::DEFAULT_TTL_RANGE.1).contains(&v) {
                errors.push(format!("default_ttl {v} out of range"));
            }
        }
        if let Some(v) = params.get("compression_threshold").and_then(Value::as_u64) {
            if !(crate::config::COMPRESSION_THRESHOLD_RANGE.0 as u64..=crate::config::COMPRESSION_THRESHOLD_RANGE.1 as u64)
                .contains(&v)
            {
                errors.push(format!("compression_threshold {v} out of range"));
            }
        }
        if let Some(v) = params.get("compression_level").and_then(Value::as_u64) {
            if !(1..=9).contains(&v) {
                errors.push(format!("compression_level {v} out of range 1..=9"));
            }
        }
        if let Some(v) = params.get("text_hash_threshold").and_then(Value::as_u64) {
            if !(crate::config::TEXT_HASH_THRESHOLD_RANGE.0..=crate::config::TEXT_HASH_THRESHOLD_RANGE.1).contains(&v) {
                errors.push(format!("text_hash_threshold {v} out of range"));
            }
        }
        if let Some(v) = params.get("l1_cache_size").and_then(Value::as_u64) {
            if !(crate::config::L1_CACHE_SIZE_RANGE.0 as u64..=crate::config::L1_CACHE_SIZE_RANGE.1 as u64).contains(&v) {
                errors.push(format!("l1_cache_size {v} out of range"));
            }
        }
    }

    fn validate_cross_field(&self, ai: &HashMap<String, Value>, errors: &mut Vec<String>, recommendations: &mut Vec<String>) {
        if let Some(tiers) = ai.get("text_size_tiers") {
            let small = tiers.get("small").and_then(Value::as_u64);
            let medium = tiers.get("medium").and_then(Value::as_u64);
            let large = tiers.get("large").and_then(Value::as_u64);
            if let (Some(s), Some(m), Some(l)) = (small, medium, large) {
                if !(s < m && m < l) {
                    errors.push("text_size_tiers must satisfy small < medium < large".to_string());
                }
            }
        }

        if let Some(ttls) = ai.get("operation_ttls").and_then(Value::as_object) {
            for (op, ttl) in ttls {
                match ttl.as_u64() {
                    Some(v) if v == 0 => errors.push(format!("operation_ttls['{op}'] must be positive")),
                    None => errors.push(format!("operation_ttls['{op}'] must be a non-negative integer")),
                    _ => {}
                }
            }
            if ttls.is_empty() {
                recommendations.push("operation_ttls is empty; all operations will use default_ttl".to_string());
            }
        }
    }
}

impl Default for ParameterMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a mapped-and-validated result onto a base configuration.
pub fn apply_mapping(base: &CacheConfig, mapper: &ParameterMapper, raw: &HashMap<String, Value>) -> (CacheConfig, MappingResult) {
    let result = mapper.map(raw);
    let overrides = mapper.to_overrides(&result);
    (base.merge(&overrides), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_key_is_reported_as_an_error() {
        let mapper = ParameterMapper::new();
        let mut raw = HashMap::new();
        raw.insert("not_a_real_option".to_string(), json!(1));
        let result = mapper.map(&raw);
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn alias_routes_to_generic_under_its_canonical_name() {
        let mapper = ParameterMapper::new();
        let mut raw = HashMap::new();
        raw.insert("memory_cache_size".to_string(), json!(500));
        let result = mapper.map(&raw);
        assert!(result.ok);
        assert_eq!(result.generic.get("l1_cache_size"), Some(&json!(500)));
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn ai_keys_are_routed_separately_from_generic_keys() {
        let mapper = ParameterMapper::new();
        let mut raw = HashMap::new();
        raw.insert("redis_url".to_string(), json!("redis://localhost"));
        raw.insert("hash_algorithm".to_string(), json!("blake3"));
        let result = mapper.map(&raw);
        assert!(result.ok);
        assert!(result.generic.contains_key("redis_url"));
        assert!(result.ai.contains_key("hash_algorithm"));
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        let mapper = ParameterMapper::new();
        let mut raw = HashMap::new();
        raw.insert("compression_level".to_string(), json!(20));
        let result = mapper.map(&raw);
        assert!(!result.ok);
    }

    #[test]
    fn non_monotonic_tiers_are_rejected_as_a_cross_field_error() {
        let mapper = ParameterMapper::new();
        let mut raw = HashMap::new();
        raw.insert("text_size_tiers".to_string(), json!({"small": 500, "medium": 100, "large": 1000}));
        let result = mapper.map(&raw);
        assert!(!result.ok);
    }

    #[test]
    fn mapping_applies_cleanly_onto_a_base_config() {
        let mapper = ParameterMapper::new();
        let mut raw = HashMap::new();
        raw.insert("l1_cache_size".to_string(), json!(250));
        let (config, result) = apply_mapping(&CacheConfig::default(), &mapper, &raw);
        assert!(result.ok);
        assert_eq!(config.l1_cache_size, 250);
    }
}
