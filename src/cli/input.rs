//! Snapshot file loading.

use crate::model::{MatrixEntry, MatrixSnapshot, VersionMetadata};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// A snapshot file: `{"entries": [...]}` with optional version details, or
/// a bare array of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDocument {
    pub version: Option<u32>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub snapshot: MatrixSnapshot,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Wrapped {
        #[serde(default)]
        version: Option<u32>,
        #[serde(default)]
        created_by: Option<String>,
        #[serde(default)]
        created_at: Option<DateTime<Utc>>,
        #[serde(default)]
        note: Option<String>,
        entries: Vec<MatrixEntry>,
    },
    Bare(Vec<MatrixEntry>),
}

impl SnapshotDocument {
    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawDocument =
            serde_json::from_str(text).context("expected {\"entries\": [...]} or an array of entries")?;
        Ok(match raw {
            RawDocument::Wrapped {
                version,
                created_by,
                created_at,
                note,
                entries,
            } => Self {
                version,
                created_by,
                created_at,
                note,
                snapshot: MatrixSnapshot::new(entries),
            },
            RawDocument::Bare(entries) => Self {
                version: None,
                created_by: None,
                created_at: None,
                note: None,
                snapshot: MatrixSnapshot::new(entries),
            },
        })
    }

    /// Version metadata, numbering the version `fallback` when the file
    /// does not say.
    #[must_use]
    pub fn metadata(&self, fallback: u32) -> VersionMetadata {
        let mut metadata = VersionMetadata::new(self.version.unwrap_or(fallback));
        metadata.created_by.clone_from(&self.created_by);
        metadata.note.clone_from(&self.note);
        if let Some(at) = self.created_at {
            metadata.created_at = at;
        }
        metadata
    }
}

/// Read and parse a snapshot file, warning about duplicate ids.
pub fn load_snapshot_file(path: &Path) -> Result<SnapshotDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = SnapshotDocument::from_json(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let duplicates = document.snapshot.duplicate_ids();
    if !duplicates.is_empty() {
        tracing::warn!(
            "{} has duplicate entry ids {:?}; the last occurrence wins",
            path.display(),
            duplicates
        );
    }
    tracing::debug!(
        "Loaded {} entries from {}",
        document.snapshot.len(),
        path.display()
    );
    Ok(document)
}
