//! Cross-module integration tests.
//!
//! Each test exercises at least two modules together through the public
//! surface — no internal test fakes are reachable here, only `CacheFactory`
//! and the standalone helpers it wires together.

use std::time::Duration;

use serde_json::json;

use ai_response_cache::config::{CacheConfig, ConfigOverrides};
use ai_response_cache::parameter_mapper::ParameterMapper;
use ai_response_cache::presets::PresetManager;
use ai_response_cache::security::{PassthroughSecurityAdapter, SecurityAdapter, SecurityLevel};
use ai_response_cache::serialization::{CacheSerializer, SerializationConfig, SerializationFormat};
use ai_response_cache::validator::Validator;
use ai_response_cache::{Cache, CacheError, CacheFactory, CacheHealth, TestingBackend};

#[tokio::test]
async fn for_web_app_cache_round_trips_a_value() {
    let cache = CacheFactory::for_web_app(None, None).await.unwrap();
    cache.set("ai_cache:op:web", b"payload".to_vec(), None).await.unwrap();
    assert_eq!(cache.get("ai_cache:op:web").await.unwrap(), Some(b"payload".to_vec()));
    assert_eq!(cache.ping().await, CacheHealth::Healthy);
}

#[tokio::test]
async fn disabled_preset_is_a_true_no_op() {
    let cache = CacheFactory::from_preset("disabled", None, None).await.unwrap();
    cache.set("k", b"v".to_vec(), None).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(!cache.delete("k").await.unwrap());
    assert!(!cache.exists("k").await.unwrap());
}

#[tokio::test]
async fn entries_expire_after_their_ttl() {
    let cache = CacheFactory::for_testing(TestingBackend::Memory, None, false).await.unwrap();
    cache
        .set("ai_cache:op:ephemeral", b"gone soon".to_vec(), Some(Duration::from_millis(5)))
        .await
        .unwrap();
    assert_eq!(cache.get("ai_cache:op:ephemeral").await.unwrap(), Some(b"gone soon".to_vec()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.get("ai_cache:op:ephemeral").await.unwrap(), None);
}

#[tokio::test]
async fn unreachable_remote_with_fail_on_connection_error_surfaces_cache_unavailable() {
    let result = CacheFactory::for_testing(TestingBackend::Redis, Some("redis://127.0.0.1:1"), true).await;
    assert!(matches!(result, Err(CacheError::CacheUnavailable(_))));
}

#[tokio::test]
async fn unreachable_remote_without_fail_flag_degrades_to_l1_only() {
    let cache = CacheFactory::for_testing(TestingBackend::Redis, Some("redis://127.0.0.1:1"), false)
        .await
        .unwrap();
    cache.set("k", b"v".to_vec(), None).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
}

#[test]
fn every_preset_is_individually_valid_and_the_disabled_one_retains_nothing() {
    let manager = PresetManager::new();
    let validator = Validator::new();
    for preset in manager.list() {
        let report = validator.validate_preset(&preset);
        assert!(report.is_valid, "{} preset failed validation: {:?}", preset.name.as_str(), report.errors);
    }

    let disabled = manager.get("disabled").unwrap();
    assert!(!disabled.config.enable_l1_cache);
    assert!(disabled.config.redis_url.is_none());
}

#[test]
fn environment_recommendation_feeds_a_valid_preset() {
    let manager = PresetManager::new();
    let recommendation = manager.recommend(Some("ai-production"));
    let preset = manager.get(recommendation.preset.as_str()).unwrap();
    assert!(Validator::new().validate_preset(&preset).is_valid);
    assert!(recommendation.confidence > 0.0);
}

#[test]
fn parameter_mapper_routes_a_raw_dict_into_a_validated_merged_config() {
    let mut raw = std::collections::HashMap::new();
    raw.insert("memory_cache_size".to_string(), json!(256));
    raw.insert("default_ttl".to_string(), json!(900));
    raw.insert("text_hash_threshold".to_string(), json!(50));

    let mapper = ParameterMapper::new();
    let mapping = mapper.map(&raw);
    assert!(mapping.ok, "mapping errors: {:?}", mapping.errors);

    let overrides = mapper.to_overrides(&mapping);
    let merged = CacheConfig::default().merge(&overrides);
    assert_eq!(merged.l1_cache_size, 256);
    assert_eq!(merged.default_ttl, 900);
    assert_eq!(merged.text_hash_threshold, 50);
    assert!(Validator::new().validate_config(&merged).is_valid);
}

#[test]
fn parameter_mapper_rejects_unknown_keys_before_they_reach_the_config() {
    let mut raw = std::collections::HashMap::new();
    raw.insert("not_a_real_field".to_string(), json!(true));
    let mapping = ParameterMapper::new().map(&raw);
    assert!(!mapping.ok);
    assert!(!mapping.errors.is_empty());
}

#[test]
fn config_round_trips_through_a_json_file_on_disk() {
    let config = CacheConfig {
        default_ttl: 1234,
        l1_cache_size: 42,
        ..CacheConfig::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, config.to_dict().unwrap().to_string()).unwrap();

    let loaded = CacheConfig::from_file(&path, None).unwrap();
    assert_eq!(loaded.default_ttl, 1234);
    assert_eq!(loaded.l1_cache_size, 42);
}

#[tokio::test]
async fn serializer_round_trips_a_typed_value_across_every_format() {
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Payload {
        id: u64,
        tags: Vec<String>,
    }
    let payload = Payload {
        id: 7,
        tags: vec!["a".to_string(), "b".to_string()],
    };

    for format in [SerializationFormat::Json, SerializationFormat::Bincode, SerializationFormat::MessagePack] {
        let mut serializer = CacheSerializer::new(SerializationConfig {
            format,
            ..SerializationConfig::default()
        });
        let bytes = serializer.serialize(&payload).unwrap();
        let restored: Payload = serializer.deserialize(&bytes).unwrap();
        assert_eq!(restored, payload);
    }
}

#[test]
fn passthrough_security_adapter_reports_itself_insecure() {
    let adapter = PassthroughSecurityAdapter;
    let status = adapter.status();
    assert_eq!(status.level, SecurityLevel::Insecure);
}

#[tokio::test]
async fn invalid_config_override_is_rejected_before_any_connection_is_attempted() {
    let overrides = ConfigOverrides {
        compression_level: Some(99),
        ..ConfigOverrides::default()
    };
    let result = CacheFactory::for_web_app(None, Some(overrides)).await;
    assert!(matches!(result, Err(CacheError::ConfigurationInvalid(_))));
}

#[tokio::test]
async fn create_from_config_with_ai_parameters_still_satisfies_the_plain_cache_contract() {
    let mut config = CacheConfig::default();
    config.operation_ttls.insert("qa".to_string(), 60);
    let cache = CacheFactory::create_from_config(config).await.unwrap();

    cache.set("ai_cache:op:qa|txt:doc|opts:abc", b"answer".to_vec(), None).await.unwrap();
    assert_eq!(
        cache.get("ai_cache:op:qa|txt:doc|opts:abc").await.unwrap(),
        Some(b"answer".to_vec())
    );
}
