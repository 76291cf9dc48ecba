//! Compress, decompress and analyze command handlers.

use super::{exit_codes, load_snapshot_file, OutputTarget};
use crate::compression::{CompressedSnapshot, SnapshotCompressor};
use crate::config::CompressionConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Compress a snapshot file.
///
/// `cache_form` emits the compact text stored in caches instead of the
/// JSON envelope with stats and checksum.
pub fn run_compress(
    input: &Path,
    config: CompressionConfig,
    cache_form: bool,
    output_file: Option<PathBuf>,
) -> Result<i32> {
    let document = load_snapshot_file(input)?;
    let compressor = SnapshotCompressor::with_config(config);

    let rendered = if cache_form {
        compressor.compress_for_cache(&document.snapshot.normalized())?
    } else {
        let compressed = compressor.compress(&document.snapshot)?;
        tracing::info!(
            "Compressed {} bytes to {} bytes ({:.1}% saved)",
            compressed.stats.original_size,
            compressed.stats.compressed_size,
            compressed.stats.ratio
        );
        serde_json::to_string_pretty(&compressed)?
    };
    OutputTarget::from_option(output_file).write(&rendered)?;
    Ok(exit_codes::SUCCESS)
}

/// Restore a snapshot from either compressed form.
pub fn run_decompress(input: &Path, output_file: Option<PathBuf>) -> Result<i32> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let compressor = SnapshotCompressor::new();

    let snapshot = if text.trim_start().starts_with('{') {
        let compressed: CompressedSnapshot = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a compressed snapshot", input.display()))?;
        compressor.decompress(&compressed)?
    } else {
        compressor.decompress_from_cache(&text)?
    };
    OutputTarget::from_option(output_file).write(&serde_json::to_string_pretty(&snapshot)?)?;
    Ok(exit_codes::SUCCESS)
}

/// Report whether compressing a snapshot is worthwhile.
pub fn run_analyze(input: &Path, config: CompressionConfig, json: bool) -> Result<i32> {
    let document = load_snapshot_file(input)?;
    let analysis = SnapshotCompressor::with_config(config).analyze_compressibility(&document.snapshot)?;

    let rendered = if json {
        serde_json::to_string_pretty(&analysis)?
    } else {
        format!(
            "Entries: {}\nSize: {} bytes\nUnique values: {} of {} ({:.1}% duplicated)\n\
             Estimated saving: {:.1}%\nRecommended: {}\n{}",
            analysis.entry_count,
            analysis.original_size,
            analysis.unique_values,
            analysis.total_values,
            analysis.duplication_ratio * 100.0,
            analysis.estimated_ratio,
            if analysis.recommended { "yes" } else { "no" },
            analysis.reason
        )
    };
    OutputTarget::Stdout.write(&rendered)?;
    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{"entries": [
        {"id": 1, "action": "ALLOW", "src_zone": "LAN", "rule_name": "web"},
        {"id": 2, "action": "DENY", "src_zone": "LAN", "rule_name": ""}
    ]}"#;

    #[test]
    fn test_compress_then_decompress_both_forms() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("snapshot.json");
        std::fs::write(&input, SNAPSHOT).unwrap();

        for cache_form in [false, true] {
            let packed = dir.path().join("packed");
            let restored = dir.path().join("restored.json");
            run_compress(&input, CompressionConfig::default(), cache_form, Some(packed.clone())).unwrap();
            run_decompress(&packed, Some(restored.clone())).unwrap();

            let snapshot: crate::model::MatrixSnapshot =
                serde_json::from_str(&std::fs::read_to_string(restored).unwrap()).unwrap();
            assert_eq!(snapshot.len(), 2);
            assert_eq!(snapshot.entries[1].rule_name, None);
        }
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("garbage");
        std::fs::write(&input, "not base64 !!").unwrap();
        assert!(run_decompress(&input, None).is_err());
    }
}
