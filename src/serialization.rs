//! Value serialization for the remote tier
//!
//! Supports JSON, Bincode, and MessagePack encodings behind one interface,
//! with per-format usage and timing statistics. Bincode uses its 1.x API
//! (`bincode::serialize`/`deserialize`), matching the version this crate
//! depends on.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::errors::{CacheError, CacheResult};

/// On-the-wire encoding used for L2 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    Json,
    Bincode,
    MessagePack,
}

impl Default for SerializationFormat {
    fn default() -> Self {
        SerializationFormat::Json
    }
}

/// Serializer configuration.
#[derive(Debug, Clone)]
pub struct SerializationConfig {
    pub format: SerializationFormat,
    pub pretty_json: bool,
    pub benchmark_on_startup: bool,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            format: SerializationFormat::Json,
            pretty_json: false,
            benchmark_on_startup: false,
        }
    }
}

/// Running serialization statistics.
#[derive(Debug, Clone, Default)]
pub struct SerializationStats {
    pub total_serializations: u64,
    pub total_deserializations: u64,
    pub bytes_serialized: u64,
    pub bytes_deserialized: u64,
    pub average_serialization_time_ms: f64,
    pub average_deserialization_time_ms: f64,
    pub format_usage: HashMap<SerializationFormat, u64>,
    pub serialization_errors: u64,
    pub deserialization_errors: u64,
}

/// One format's measured cost for a representative payload.
#[derive(Debug, Clone)]
pub struct SerializationBenchmark {
    pub format: SerializationFormat,
    pub avg_serialization_time_ms: f64,
    pub avg_deserialization_time_ms: f64,
    pub avg_size_bytes: usize,
    pub throughput_ops_per_sec: f64,
    pub error_rate: f64,
}

/// Serializes/deserializes cache values and tracks format usage.
pub struct CacheSerializer {
    config: SerializationConfig,
    stats: SerializationStats,
}

impl CacheSerializer {
    pub fn new(config: SerializationConfig) -> Self {
        Self {
            config,
            stats: SerializationStats::default(),
        }
    }

    pub fn serialize<T>(&mut self, value: &T) -> CacheResult<Vec<u8>>
    where
        T: Serialize,
    {
        let start = Instant::now();
        let result = match self.config.format {
            SerializationFormat::Json => self.serialize_json(value),
            SerializationFormat::Bincode => self.serialize_bincode(value),
            SerializationFormat::MessagePack => self.serialize_messagepack(value),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(data) => self.record_serialization(data.len(), elapsed_ms, false),
            Err(_) => self.record_serialization(0, elapsed_ms, true),
        }
        result
    }

    pub fn deserialize<T>(&mut self, data: &[u8]) -> CacheResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let start = Instant::now();
        let result = match self.config.format {
            SerializationFormat::Json => self.deserialize_json(data),
            SerializationFormat::Bincode => self.deserialize_bincode(data),
            SerializationFormat::MessagePack => self.deserialize_messagepack(data),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => self.record_deserialization(data.len(), elapsed_ms, false),
            Err(_) => self.record_deserialization(data.len(), elapsed_ms, true),
        }
        result
    }

    fn serialize_json<T: Serialize>(&self, value: &T) -> CacheResult<Vec<u8>> {
        if self.config.pretty_json {
            serde_json::to_vec_pretty(value).map_err(|e| CacheError::Serialization(format!("json: {e}")))
        } else {
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(format!("json: {e}")))
        }
    }

    fn deserialize_json<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> CacheResult<T> {
        serde_json::from_slice(data).map_err(|e| CacheError::Deserialization(format!("json: {e}")))
    }

    fn serialize_bincode<T: Serialize>(&self, value: &T) -> CacheResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| CacheError::Serialization(format!("bincode: {e}")))
    }

    fn deserialize_bincode<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> CacheResult<T> {
        bincode::deserialize(data).map_err(|e| CacheError::Deserialization(format!("bincode: {e}")))
    }

    fn serialize_messagepack<T: Serialize>(&self, value: &T) -> CacheResult<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| CacheError::Serialization(format!("messagepack: {e}")))
    }

    fn deserialize_messagepack<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> CacheResult<T> {
        rmp_serde::from_slice(data).map_err(|e| CacheError::Deserialization(format!("messagepack: {e}")))
    }

    /// One-time startup comparison of the three formats against a
    /// representative payload, gated by `SerializationConfig::benchmark_on_startup`.
    pub fn benchmark_formats<T>(&mut self, value: &T, iterations: usize) -> CacheResult<Vec<SerializationBenchmark>>
    where
        T: Serialize + for<'de> Deserialize<'de>,
    {
        let formats = [
            SerializationFormat::Json,
            SerializationFormat::Bincode,
            SerializationFormat::MessagePack,
        ];
        let original_format = self.config.format;
        let mut benchmarks = Vec::with_capacity(formats.len());

        for format in formats {
            self.config.format = format;

            let mut total_ser_ms = 0.0;
            let mut total_deser_ms = 0.0;
            let mut total_size = 0usize;
            let mut errors = 0usize;

            for _ in 0..iterations {
                let ser_start = Instant::now();
                match self.serialize(value) {
                    Ok(data) => {
                        total_ser_ms += ser_start.elapsed().as_secs_f64() * 1000.0;
                        total_size += data.len();

                        let deser_start = Instant::now();
                        match self.deserialize::<T>(&data) {
                            Ok(_) => total_deser_ms += deser_start.elapsed().as_secs_f64() * 1000.0,
                            Err(_) => errors += 1,
                        }
                    }
                    Err(_) => errors += 1,
                }
            }

            let denom = iterations.max(1) as f64;
            let avg_ser_ms = total_ser_ms / denom;
            let avg_deser_ms = total_deser_ms / denom;
            let throughput = if avg_ser_ms + avg_deser_ms > 0.0 {
                1000.0 / (avg_ser_ms + avg_deser_ms)
            } else {
                0.0
            };

            benchmarks.push(SerializationBenchmark {
                format,
                avg_serialization_time_ms: avg_ser_ms,
                avg_deserialization_time_ms: avg_deser_ms,
                avg_size_bytes: total_size / iterations.max(1),
                throughput_ops_per_sec: throughput,
                error_rate: errors as f64 / denom,
            });
        }

        self.config.format = original_format;
        Ok(benchmarks)
    }

    fn record_serialization(&mut self, size: usize, time_ms: f64, error: bool) {
        if error {
            self.stats.serialization_errors += 1;
            return;
        }
        self.stats.total_serializations += 1;
        self.stats.bytes_serialized += size as u64;
        let n = self.stats.total_serializations as f64;
        self.stats.average_serialization_time_ms =
            (self.stats.average_serialization_time_ms * (n - 1.0) + time_ms) / n;
        *self.stats.format_usage.entry(self.config.format).or_insert(0) += 1;
    }

    fn record_deserialization(&mut self, size: usize, time_ms: f64, error: bool) {
        if error {
            self.stats.deserialization_errors += 1;
            return;
        }
        self.stats.total_deserializations += 1;
        self.stats.bytes_deserialized += size as u64;
        let n = self.stats.total_deserializations as f64;
        self.stats.average_deserialization_time_ms =
            (self.stats.average_deserialization_time_ms * (n - 1.0) + time_ms) / n;
    }

    pub fn get_stats(&self) -> &SerializationStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = SerializationStats::default();
    }

    pub fn get_config(&self) -> &SerializationConfig {
        &self.config
    }
}
