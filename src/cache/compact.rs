//! Trimmed cache representations of diffs and timelines.
//!
//! Diffs drop the redundant `old_entry`/`new_entry` copies and keep only
//! field deltas; the full form is rebuilt on read.

use crate::diff::{ChangeType, DiffEntry, DiffMetadata, FieldChange, MatrixDiff, VersionChangeStats};
use crate::model::{EntryField, MatrixEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

type Timestamps = [Option<DateTime<Utc>>; 2];

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CompactDiff {
    m: DiffMetadata,
    e: Vec<CompactEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompactEntry {
    t: ChangeType,
    /// New entry, or the old one for removals
    e: MatrixEntry,
    /// `(field, old, new)` per changed field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    d: Vec<(EntryField, Option<String>, Option<String>)>,
    /// Old timestamps, when they differ from `e`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ts: Option<Timestamps>,
}

fn timestamps(entry: &MatrixEntry) -> Timestamps {
    [entry.created_at, entry.updated_at]
}

impl From<&MatrixDiff> for CompactDiff {
    fn from(diff: &MatrixDiff) -> Self {
        let e = diff
            .entries
            .iter()
            .map(|entry| {
                let old_ts = entry.old_entry.as_ref().map(timestamps);
                CompactEntry {
                    t: entry.change_type,
                    e: entry.entry.clone(),
                    d: entry
                        .changes
                        .iter()
                        .map(|c| (c.field, c.old_value.clone(), c.new_value.clone()))
                        .collect(),
                    ts: old_ts.filter(|ts| *ts != timestamps(&entry.entry)),
                }
            })
            .collect();
        Self {
            m: diff.metadata.clone(),
            e,
        }
    }
}

impl CompactDiff {
    pub(crate) fn into_diff(self) -> MatrixDiff {
        let entries = self.e.into_iter().map(CompactEntry::into_entry).collect();
        MatrixDiff::from_entries(entries, self.m)
    }
}

impl CompactEntry {
    fn into_entry(self) -> DiffEntry {
        match self.t {
            ChangeType::Added => DiffEntry::added(&self.e),
            ChangeType::Removed => DiffEntry::removed(&self.e),
            ChangeType::Modified | ChangeType::Unchanged => {
                let mut old = self.e.clone();
                for (field, old_value, _) in &self.d {
                    old.set(*field, old_value.clone());
                }
                if let Some([created_at, updated_at]) = self.ts {
                    old.created_at = created_at;
                    old.updated_at = updated_at;
                }
                let changes = self
                    .d
                    .into_iter()
                    .filter_map(|(field, old_value, new_value)| {
                        FieldChange::between(field, old_value.as_deref(), new_value.as_deref())
                    })
                    .collect();
                DiffEntry {
                    change_type: self.t,
                    old_entry: Some(old),
                    new_entry: Some(self.e.clone()),
                    entry: self.e,
                    changes,
                }
            }
        }
    }
}

/// Timeline row with abbreviated keys.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CompactVersionStats {
    v: u32,
    at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<String>,
    a: usize,
    r: usize,
    m: usize,
    t: usize,
    d: String,
}

impl From<&VersionChangeStats> for CompactVersionStats {
    fn from(s: &VersionChangeStats) -> Self {
        Self {
            v: s.version,
            at: s.created_at,
            by: s.created_by.clone(),
            n: s.note.clone(),
            a: s.added,
            r: s.removed,
            m: s.modified,
            t: s.total_entries,
            d: s.description.clone(),
        }
    }
}

impl From<CompactVersionStats> for VersionChangeStats {
    fn from(c: CompactVersionStats) -> Self {
        Self {
            version: c.v,
            created_at: c.at,
            created_by: c.by,
            note: c.n,
            added: c.a,
            removed: c.r,
            modified: c.m,
            total_entries: c.t,
            description: c.d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffEngine;
    use crate::model::MatrixSnapshot;

    #[test]
    fn test_compact_diff_restores_exactly() {
        let mut old_unchanged = MatrixEntry::new(3).with(EntryField::RuleName, "same");
        old_unchanged.updated_at = Some(Utc::now());
        let old = MatrixSnapshot::new(vec![
            MatrixEntry::new(1).with(EntryField::Action, "ALLOW"),
            MatrixEntry::new(2).with(EntryField::Comment, "bye"),
            old_unchanged,
        ]);
        let new = MatrixSnapshot::new(vec![
            MatrixEntry::new(1).with(EntryField::Action, "DENY"),
            MatrixEntry::new(3).with(EntryField::RuleName, "same"),
            MatrixEntry::new(4),
        ]);
        let diff = DiffEngine::new().generate_diff(&old, &new, DiffMetadata::versions(1, 2));
        let restored = CompactDiff::from(&diff).into_diff();
        assert_eq!(restored, diff);
    }
}
