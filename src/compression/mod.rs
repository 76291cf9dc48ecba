//! Snapshot compression with integrity checking.
//!
//! Pipeline, each stage reversible:
//!
//! 1. normalize: key-sorted maps, empty strings as null
//! 2. dictionary substitution of field names and frequent values
//! 3. columnar transpose `{_format, _keys, _data}`
//! 4. gzip of the JSON-serialized columnar form
//!
//! The SHA-256 of the stage 3 bytes is stored alongside the payload and
//! re-verified on decompression.

mod codec;
pub mod dictionary;

pub use codec::{gunzip, gzip, pack_json, unpack_json};

use crate::config::CompressionConfig;
use crate::error::{ErrorContext, HistoryError, Result};
use crate::model::MatrixSnapshot;
use crate::utils::sha256_hex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Payload layout version stored in [`CompressionMetadata`]
pub const FORMAT_VERSION: u32 = 1;

const ALGORITHM: &str = "gzip+dict+columnar";

/// Size and integrity information for a compressed snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Size of the snapshot entries as plain JSON
    pub original_size: usize,
    pub compressed_size: usize,
    /// Percentage saved relative to `original_size`
    pub ratio: f64,
    pub algorithm: String,
    /// Hex SHA-256 of the serialized columnar form
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionMetadata {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    /// Number of columns in the payload
    pub fields: usize,
}

/// A compressed snapshot with its integrity checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedSnapshot {
    pub data: Vec<u8>,
    pub stats: CompressionStats,
    pub metadata: CompressionMetadata,
}

/// Cheap estimate of whether compressing a snapshot pays off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressibilityAnalysis {
    pub entry_count: usize,
    /// Plain JSON size in bytes
    pub original_size: usize,
    pub total_values: usize,
    pub unique_values: usize,
    /// Share of repeated values, 0.0 to 1.0
    pub duplication_ratio: f64,
    /// Estimated percentage saved
    pub estimated_ratio: f64,
    pub recommended: bool,
    pub reason: String,
}

/// Compresses and restores snapshots.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCompressor {
    config: CompressionConfig,
}

impl SnapshotCompressor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_config(config: CompressionConfig) -> Self {
        Self { config }
    }

    /// Compress a snapshot and record its checksum.
    pub fn compress(&self, snapshot: &MatrixSnapshot) -> Result<CompressedSnapshot> {
        let original_size = serde_json::to_vec(&snapshot.entries)?.len();
        let payload = codec::to_columnar(&snapshot.entries)?;
        let fields = payload.keys.len();
        let serialized = serde_json::to_vec(&payload)?;
        let checksum = sha256_hex(&serialized);
        let data = gzip(&serialized, self.config.level)?;

        let stats = CompressionStats {
            original_size,
            compressed_size: data.len(),
            ratio: saved_percent(original_size, data.len()),
            algorithm: ALGORITHM.to_string(),
            checksum,
        };
        tracing::debug!(
            entries = snapshot.len(),
            original = stats.original_size,
            compressed = stats.compressed_size,
            ratio = stats.ratio,
            "Compressed snapshot"
        );

        Ok(CompressedSnapshot {
            data,
            stats,
            metadata: CompressionMetadata {
                version: FORMAT_VERSION,
                timestamp: Utc::now(),
                fields,
            },
        })
    }

    /// Restore a snapshot, failing if the payload does not match its checksum.
    ///
    /// Nothing is returned unless the checksum verifies.
    pub fn decompress(&self, compressed: &CompressedSnapshot) -> Result<MatrixSnapshot> {
        if compressed.metadata.version != FORMAT_VERSION {
            return Err(HistoryError::corrupt(
                "decompressing snapshot",
                format!("unsupported payload version {}", compressed.metadata.version),
            ));
        }
        let serialized = gunzip(&compressed.data)?;
        let actual = sha256_hex(&serialized);
        if actual != compressed.stats.checksum {
            tracing::warn!(
                expected = %compressed.stats.checksum,
                actual = %actual,
                "Snapshot checksum mismatch"
            );
            return Err(HistoryError::checksum_mismatch(&compressed.stats.checksum, actual));
        }
        let payload = serde_json::from_slice(&serialized)
            .map_err(|e| HistoryError::corrupt("parsing columnar payload", e.to_string()))?;
        Ok(MatrixSnapshot::new(codec::from_columnar(payload)?))
    }

    /// Compress to base64 text for the cache. No checksum is kept.
    pub fn compress_for_cache(&self, snapshot: &MatrixSnapshot) -> Result<String> {
        pack_json(&codec::to_columnar(&snapshot.entries)?, self.config.level)
    }

    /// Reverse [`Self::compress_for_cache`].
    pub fn decompress_from_cache(&self, text: &str) -> Result<MatrixSnapshot> {
        let payload = unpack_json(text).context("reading cached snapshot")?;
        let entries = codec::from_columnar(payload).context("reading cached snapshot")?;
        Ok(MatrixSnapshot::new(entries))
    }

    /// Estimate compressibility from value duplication, without compressing.
    pub fn analyze_compressibility(&self, snapshot: &MatrixSnapshot) -> Result<CompressibilityAnalysis> {
        let original_size = serde_json::to_vec(&snapshot.entries)?.len();

        let mut total_values = 0usize;
        let mut unique: HashSet<&str> = HashSet::new();
        for entry in &snapshot.entries {
            for field in crate::model::EntryField::ALL {
                if let Some(value) = entry.get(field).filter(|v| !v.is_empty()) {
                    total_values += 1;
                    unique.insert(value);
                }
            }
        }
        let duplication_ratio = if total_values == 0 {
            0.0
        } else {
            1.0 - unique.len() as f64 / total_values as f64
        };

        // Columnar layout drops repeated keys; gzip then feeds on repeated values.
        let key_saving = if snapshot.len() > 1 { 25.0 } else { 0.0 };
        let estimated_ratio = (key_saving + duplication_ratio * 65.0).min(95.0);

        let large = original_size > self.config.min_size_bytes;
        let compressible = estimated_ratio > f64::from(self.config.min_ratio_percent);
        let reason = match (large, compressible) {
            (true, true) => "Large snapshot with highly repetitive values".to_string(),
            (true, false) => format!("Snapshot exceeds {} bytes", self.config.min_size_bytes),
            (false, true) => format!("Estimated saving {estimated_ratio:.0}% exceeds threshold"),
            (false, false) => "Small snapshot with little repetition".to_string(),
        };

        Ok(CompressibilityAnalysis {
            entry_count: snapshot.len(),
            original_size,
            total_values,
            unique_values: unique.len(),
            duplication_ratio,
            estimated_ratio,
            recommended: large || compressible,
            reason,
        })
    }
}

fn saved_percent(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryField, MatrixEntry};

    fn snapshot(n: i64) -> MatrixSnapshot {
        MatrixSnapshot::new(
            (1..=n)
                .map(|id| {
                    MatrixEntry::new(id)
                        .with(EntryField::Action, if id % 3 == 0 { "DENY" } else { "ALLOW" })
                        .with(EntryField::ProtocolGroup, "TCP")
                        .with(EntryField::SrcZone, "LAN")
                        .with(EntryField::DstZone, "DMZ")
                        .with(EntryField::RuleName, format!("rule-{id}"))
                })
                .collect(),
        )
    }

    #[test]
    fn test_round_trip() {
        let compressor = SnapshotCompressor::new();
        let original = snapshot(50);
        let compressed = compressor.compress(&original).unwrap();
        assert_eq!(compressor.decompress(&compressed).unwrap(), original);
        assert!(compressed.stats.ratio > 50.0);
        assert_eq!(compressed.stats.checksum.len(), 64);
    }

    #[test]
    fn test_empty_snapshot_round_trip() {
        let compressor = SnapshotCompressor::new();
        let compressed = compressor.compress(&MatrixSnapshot::default()).unwrap();
        assert_eq!(compressed.metadata.fields, 0);
        assert!(compressor.decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_flipped_byte_is_integrity_error() {
        let compressor = SnapshotCompressor::new();
        let mut compressed = compressor.compress(&snapshot(20)).unwrap();
        let mid = compressed.data.len() / 2;
        compressed.data[mid] ^= 0xFF;
        let err = compressor.decompress(&compressed).unwrap_err();
        assert!(err.is_integrity(), "unexpected error: {err}");
    }

    #[test]
    fn test_tampered_checksum_is_rejected() {
        let compressor = SnapshotCompressor::new();
        let mut compressed = compressor.compress(&snapshot(3)).unwrap();
        compressed.stats.checksum = "0".repeat(64);
        assert!(matches!(
            compressor.decompress(&compressed),
            Err(HistoryError::Integrity {
                source: crate::error::IntegrityErrorKind::ChecksumMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_cache_variant_round_trip() {
        let compressor = SnapshotCompressor::new();
        let original = snapshot(10);
        let text = compressor.compress_for_cache(&original).unwrap();
        assert!(text.is_ascii());
        assert_eq!(compressor.decompress_from_cache(&text).unwrap(), original);
    }

    #[test]
    fn test_analyze_compressibility() {
        let compressor = SnapshotCompressor::new();
        let analysis = compressor.analyze_compressibility(&snapshot(200)).unwrap();
        assert!(analysis.duplication_ratio > 0.5);
        assert!(analysis.recommended);

        let tiny = compressor
            .analyze_compressibility(&MatrixSnapshot::new(vec![MatrixEntry::new(1)]))
            .unwrap();
        assert_eq!(tiny.total_values, 0);
        assert!(!tiny.recommended);
    }
}
