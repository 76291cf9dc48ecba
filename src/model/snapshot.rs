//! Snapshots and version metadata.

use super::MatrixEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered list of entries as they existed at one matrix version.
///
/// Snapshots are append-only history: they are never mutated after capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSnapshot {
    pub entries: Vec<MatrixEntry>,
}

impl MatrixSnapshot {
    /// Create a snapshot from entries in capture order.
    #[must_use]
    pub fn new(entries: Vec<MatrixEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy with every entry normalized (empty strings become `None`).
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            entries: self.entries.iter().map(MatrixEntry::normalized).collect(),
        }
    }

    /// Ids that appear more than once, in first-seen order.
    ///
    /// Entries are correlated by id, so duplicates make a diff ambiguous;
    /// the last occurrence wins when indexing.
    #[must_use]
    pub fn duplicate_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut reported = HashSet::new();
        let mut duplicates = Vec::new();
        for entry in &self.entries {
            if !seen.insert(entry.id) && reported.insert(entry.id) {
                duplicates.push(entry.id);
            }
        }
        duplicates
    }
}

impl From<Vec<MatrixEntry>> for MatrixSnapshot {
    fn from(entries: Vec<MatrixEntry>) -> Self {
        Self::new(entries)
    }
}

/// Descriptive metadata for one matrix version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub version: u32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl VersionMetadata {
    /// Metadata for a version created now with no note or author.
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            note: None,
            created_at: Utc::now(),
            created_by: None,
        }
    }

    /// Set the author.
    #[must_use]
    pub fn created_by(mut self, author: impl Into<String>) -> Self {
        self.created_by = Some(author.into());
        self
    }

    /// Set the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set the creation time.
    #[must_use]
    pub const fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_ids_reported_once() {
        let snapshot = MatrixSnapshot::new(vec![
            MatrixEntry::new(1),
            MatrixEntry::new(2),
            MatrixEntry::new(1),
            MatrixEntry::new(1),
        ]);
        assert_eq!(snapshot.duplicate_ids(), vec![1]);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = MatrixSnapshot::new(vec![MatrixEntry::new(4)]);
        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["entries"][0]["id"], 4);
    }
}
