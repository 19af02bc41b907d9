//! Deterministic cache key generation
//!
//! Builds `ai_cache:` namespaced keys from (text, operation, options). Large
//! text is hashed rather than embedded so keys stay small and debuggable for
//! short inputs while remaining bounded for long documents.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Selectable hashing algorithm for text and options digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Sha256,
    Blake3,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl HashAlgorithm {
    fn digest_hex(&self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(bytes);
                hex::encode(hasher.finalize())
            }
            HashAlgorithm::Blake3 => blake3::hash(bytes).to_hex().to_string(),
        }
    }
}

/// Minimal hex encoder so the crate doesn't need a dedicated `hex` dependency
/// beyond what `sha2`'s output already requires formatting for.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let bytes = bytes.as_ref();
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            write!(out, "{:02x}", b).expect("writing to a String never fails");
        }
        out
    }
}

/// Produces deterministic cache keys for the AI specialization.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    text_hash_threshold: usize,
    hash_algorithm: HashAlgorithm,
}

impl KeyGenerator {
    pub fn new(text_hash_threshold: usize, hash_algorithm: HashAlgorithm) -> Self {
        Self {
            text_hash_threshold,
            hash_algorithm,
        }
    }

    /// Build a cache key of the form:
    /// `ai_cache:op:{operation}|txt:{text_or_hash}|opts:{opts_hash}[|q:{question_hash}]`
    pub fn build_key(&self, text: &str, operation: &str, options: &Value) -> String {
        let text_segment = if text.chars().count() <= self.text_hash_threshold {
            text.to_string()
        } else {
            format!("hash:{}", self.hash_text(text))
        };

        let opts_without_question = strip_question(options);
        let opts_hash = self.hash_options(&opts_without_question);

        let mut key = format!(
            "ai_cache:op:{operation}|txt:{text_segment}|opts:{opts_hash}",
        );

        if let Some(question) = options.get("question").and_then(Value::as_str) {
            key.push_str("|q:");
            key.push_str(&self.hash_algorithm.digest_hex(question.as_bytes())[..16]);
        }

        key
    }

    /// Hash text with the configured algorithm (streaming for large inputs).
    pub fn hash_text(&self, text: &str) -> String {
        match self.hash_algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                // Feed in fixed-size chunks rather than the whole buffer at
                // once so arbitrarily large documents don't need a second
                // contiguous copy beyond what `&str` already holds.
                for chunk in text.as_bytes().chunks(64 * 1024) {
                    hasher.update(chunk);
                }
                hex::encode(hasher.finalize())
            }
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for chunk in text.as_bytes().chunks(64 * 1024) {
                    hasher.update(chunk);
                }
                hasher.finalize().to_hex().to_string()
            }
        }
    }

    /// Hash a canonicalized options value to a 16-character prefix of the
    /// digest. Canonicalization sorts object keys so option insertion order
    /// never affects the resulting key.
    fn hash_options(&self, options: &Value) -> String {
        let canonical = canonicalize(options);
        let digest = self.hash_algorithm.digest_hex(canonical.as_bytes());
        digest[..16].to_string()
    }
}

/// Returns a clone of `options` with the `question` field removed, so it can
/// be hashed independently into its own key segment.
fn strip_question(options: &Value) -> Value {
    match options {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("question");
            Value::Object(map)
        }
        other => other.clone(),
    }
}

/// Serializes a JSON value with object keys sorted recursively, so two
/// logically-equal option maps that were constructed in different insertion
/// orders produce identical bytes.
fn canonicalize(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key).unwrap_or_default());
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }

    let mut out = String::new();
    write(value, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generator() -> KeyGenerator {
        KeyGenerator::new(50, HashAlgorithm::Sha256)
    }

    #[test]
    fn small_text_is_embedded_literally() {
        let key = generator().build_key("Hello world.", "summarize", &json!({"max_length": 100}));
        assert!(key.contains("txt:Hello world."));
        assert!(key.starts_with("ai_cache:op:summarize|"));
    }

    #[test]
    fn large_text_is_hashed_and_deterministic() {
        let text = "A".repeat(10_000);
        let gen = generator();
        let key1 = gen.build_key(&text, "summarize", &json!({}));
        let key2 = gen.build_key(&text, "summarize", &json!({}));
        assert_eq!(key1, key2);
        assert!(!key1.contains(&text));
        let hash_segment = key1.split("txt:hash:").nth(1).unwrap();
        let hash_hex: String = hash_segment.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        assert_eq!(hash_hex.len(), 64);
    }

    #[test]
    fn option_insertion_order_does_not_change_key() {
        let gen = generator();
        let a = gen.build_key("text", "summarize", &json!({"a": 1, "b": 2}));
        let b = gen.build_key("text", "summarize", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn question_is_keyed_independently() {
        let gen = generator();
        let q1 = gen.build_key("doc", "qa", &json!({"question": "Q1"}));
        let q2 = gen.build_key("doc", "qa", &json!({"question": "Q2"}));
        assert_ne!(q1, q2);
        assert!(q1.contains("|q:"));
    }

    #[test]
    fn question_does_not_affect_opts_hash_segment() {
        let gen = generator();
        let with_q = gen.build_key("doc", "qa", &json!({"question": "Q1", "style": "terse"}));
        let without_q = gen.build_key("doc", "qa", &json!({"style": "terse"}));
        let opts_with = with_q.split("opts:").nth(1).unwrap().split('|').next().unwrap();
        let opts_without = without_q.split("opts:").nth(1).unwrap();
        assert_eq!(opts_with, opts_without);
    }
}
