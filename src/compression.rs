//! Payload compression and the L2 envelope format
//!
//! The remote store holds one byte of framing ahead of every value: `0x00`
//! for an uncompressed payload, `0x01` for zlib-compressed. This lets a
//! reader tell the two apart without probing zlib's magic bytes, and lets
//! the compression threshold change across deployments without breaking old
//! entries still sitting in the remote store.

use std::io::{Read, Write};
use std::time::Instant;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::errors::{CacheError, CacheResult};

const FLAG_UNCOMPRESSED: u8 = 0x00;
const FLAG_COMPRESSED: u8 = 0x01;

/// Compresses a payload and wraps it in the L2 envelope if it meets the
/// configured size threshold; otherwise wraps it uncompressed.
pub struct CacheCompressor {
    threshold_bytes: usize,
    level: u32,
    stats: CompressionStats,
}

/// Running compression statistics, surfaced through the performance monitor.
#[derive(Debug, Clone, Default)]
pub struct CompressionStats {
    pub total_compressions: u64,
    pub total_decompressions: u64,
    pub bytes_compressed: u64,
    pub bytes_decompressed: u64,
    pub compression_ratio: f64,
    pub average_compression_time_ms: f64,
    pub average_decompression_time_ms: f64,
}

impl CacheCompressor {
    pub fn new(threshold_bytes: usize, level: u32) -> Self {
        Self {
            threshold_bytes,
            level: level.clamp(1, 9),
            stats: CompressionStats::default(),
        }
    }

    pub fn threshold_bytes(&self) -> usize {
        self.threshold_bytes
    }

    /// Envelope `data` for storage: compress and flag it if it is at least
    /// `threshold_bytes` long, otherwise pass it through with the
    /// uncompressed flag. Returns `(envelope, was_compressed)`.
    pub fn envelope(&mut self, data: &[u8]) -> CacheResult<(Vec<u8>, bool)> {
        if data.len() < self.threshold_bytes {
            let mut out = Vec::with_capacity(data.len() + 1);
            out.push(FLAG_UNCOMPRESSED);
            out.extend_from_slice(data);
            return Ok((out, false));
        }

        let start = Instant::now();
        let compressed = self.compress_zlib(data)?;
        self.record_compression(data.len(), compressed.len(), start.elapsed().as_secs_f64() * 1000.0);

        let mut out = Vec::with_capacity(compressed.len() + 1);
        out.push(FLAG_COMPRESSED);
        out.extend_from_slice(&compressed);
        Ok((out, true))
    }

    /// Reverse of `envelope`. Tolerates legacy payloads with no discriminator
    /// byte by treating an unrecognized leading byte as uncompressed data and
    /// returning the bytes unchanged (the spec's migration allowance).
    pub fn unenvelope(&mut self, data: &[u8]) -> CacheResult<Vec<u8>> {
        let Some((&flag, rest)) = data.split_first() else {
            return Ok(Vec::new());
        };

        match flag {
            FLAG_UNCOMPRESSED => Ok(rest.to_vec()),
            FLAG_COMPRESSED => {
                let start = Instant::now();
                let decompressed = self.decompress_zlib(rest)?;
                self.record_decompression(rest.len(), decompressed.len(), start.elapsed().as_secs_f64() * 1000.0);
                Ok(decompressed)
            }
            _ => Ok(data.to_vec()),
        }
    }

    fn compress_zlib(&self, data: &[u8]) -> CacheResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder
            .write_all(data)
            .map_err(|e| CacheError::Compression(format!("zlib write failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| CacheError::Compression(format!("zlib finish failed: {e}")))
    }

    fn decompress_zlib(&self, data: &[u8]) -> CacheResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CacheError::Compression(format!("zlib decompression failed: {e}")))?;
        Ok(out)
    }

    fn record_compression(&mut self, original_size: usize, compressed_size: usize, time_ms: f64) {
        self.stats.total_compressions += 1;
        self.stats.bytes_compressed += original_size as u64;

        let n = self.stats.total_compressions as f64;
        self.stats.average_compression_time_ms =
            (self.stats.average_compression_time_ms * (n - 1.0) + time_ms) / n;

        if original_size > 0 {
            let ratio = compressed_size as f64 / original_size as f64;
            self.stats.compression_ratio = (self.stats.compression_ratio * (n - 1.0) + ratio) / n;
        }
    }

    fn record_decompression(&mut self, compressed_size: usize, decompressed_size: usize, time_ms: f64) {
        let _ = compressed_size;
        self.stats.total_decompressions += 1;
        self.stats.bytes_decompressed += decompressed_size as u64;

        let n = self.stats.total_decompressions as f64;
        self.stats.average_decompression_time_ms =
            (self.stats.average_decompression_time_ms * (n - 1.0) + time_ms) / n;
    }

    pub fn get_stats(&self) -> &CompressionStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CompressionStats::default();
    }

    /// Compute compression efficiency for a representative payload, without
    /// consulting the configured threshold (always compresses).
    pub fn calculate_efficiency(&self, data: &[u8]) -> CacheResult<CompressionEfficiency> {
        let original_size = data.len();
        let compressed = self.compress_zlib(data)?;
        let compressed_size = compressed.len();

        let compression_ratio = if original_size > 0 {
            compressed_size as f64 / original_size as f64
        } else {
            1.0
        };
        let space_saved = original_size.saturating_sub(compressed_size);
        let space_saved_percentage = if original_size > 0 {
            (space_saved as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };

        Ok(CompressionEfficiency {
            original_size,
            compressed_size,
            compression_ratio,
            space_saved,
            space_saved_percentage,
            compression_level: self.level,
        })
    }
}

/// Compression efficiency metrics for a single representative payload.
#[derive(Debug, Clone)]
pub struct CompressionEfficiency {
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f64,
    pub space_saved: usize,
    pub space_saved_percentage: f64,
    pub compression_level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_below_threshold_is_stored_uncompressed() {
        let mut c = CacheCompressor::new(1024, 6);
        let payload = vec![b'x'; 512];
        let (envelope, was_compressed) = c.envelope(&payload).unwrap();
        assert!(!was_compressed);
        assert_eq!(envelope[0], FLAG_UNCOMPRESSED);
        assert_eq!(&envelope[1..], &payload[..]);
    }

    #[test]
    fn payload_above_threshold_is_compressed_and_round_trips() {
        let mut c = CacheCompressor::new(1024, 6);
        let payload = serde_json::to_vec(&serde_json::json!({"data": "x".repeat(2048)})).unwrap();
        assert!(payload.len() >= 1024);
        let (envelope, was_compressed) = c.envelope(&payload).unwrap();
        assert!(was_compressed);
        assert_eq!(envelope[0], FLAG_COMPRESSED);

        let restored = c.unenvelope(&envelope).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn round_trip_holds_for_all_levels_up_to_one_mebibyte() {
        let payload = vec![7u8; 1024 * 1024];
        for level in 1..=9 {
            let mut c = CacheCompressor::new(0, level);
            let (envelope, _) = c.envelope(&payload).unwrap();
            let restored = c.unenvelope(&envelope).unwrap();
            assert_eq!(restored, payload, "level {level} failed to round-trip");
        }
    }

    #[test]
    fn legacy_payload_without_discriminator_passes_through() {
        let mut c = CacheCompressor::new(1024, 6);
        let legacy = b"\xffnot a real flag but should pass through".to_vec();
        let restored = c.unenvelope(&legacy).unwrap();
        assert_eq!(restored, legacy);
    }
}
