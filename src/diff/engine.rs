//! Snapshot diff engine implementation.

use super::{DiffEntry, DiffMetadata, MatrixDiff, QuickDiff, VersionChangeStats};
use crate::model::{MatrixSnapshot, VersionMetadata};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Diff engine for comparing matrix snapshots.
///
/// Entries are correlated by id. The output order is part of the contract:
/// every new-snapshot entry in snapshot order, followed by removed entries in
/// old-snapshot order.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    include_unchanged: bool,
}

impl DiffEngine {
    /// Create a new diff engine. Unchanged entries are kept in the output.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            include_unchanged: true,
        }
    }

    /// Keep or drop `unchanged` entries from `MatrixDiff::entries`.
    ///
    /// Dropping them also removes them from the summary, so the summary
    /// invariant still holds over the returned entries.
    #[must_use]
    pub const fn include_unchanged(mut self, include: bool) -> Self {
        self.include_unchanged = include;
        self
    }

    /// Compare two snapshots and return the structured diff.
    pub fn generate_diff(
        &self,
        old: &MatrixSnapshot,
        new: &MatrixSnapshot,
        metadata: DiffMetadata,
    ) -> MatrixDiff {
        let old_by_id: IndexMap<i64, _> = old.entries.iter().map(|e| (e.id, e)).collect();
        let new_by_id: IndexMap<i64, _> = new.entries.iter().map(|e| (e.id, e)).collect();

        let mut visited = HashSet::with_capacity(new_by_id.len());
        let mut entries = Vec::with_capacity(old_by_id.len().max(new_by_id.len()));

        for (id, new_entry) in &new_by_id {
            visited.insert(*id);
            let diff_entry = match old_by_id.get(id) {
                None => DiffEntry::added(new_entry),
                Some(old_entry) => DiffEntry::compared(old_entry, new_entry),
            };
            if self.include_unchanged || diff_entry.change_type != super::ChangeType::Unchanged {
                entries.push(diff_entry);
            }
        }

        entries.extend(
            old_by_id
                .iter()
                .filter(|(id, _)| !visited.contains(*id))
                .map(|(_, old_entry)| DiffEntry::removed(old_entry)),
        );

        let diff = MatrixDiff::from_entries(entries, metadata);
        tracing::debug!(
            from = diff.metadata.from_version,
            to = diff.metadata.to_version,
            added = diff.summary.added,
            removed = diff.summary.removed,
            modified = diff.summary.modified,
            unchanged = diff.summary.unchanged,
            "Generated matrix diff"
        );
        diff
    }

    /// Compare two snapshots and summarize the result for a glance.
    #[must_use]
    pub fn generate_quick_diff(&self, old: &MatrixSnapshot, new: &MatrixSnapshot) -> QuickDiff {
        let diff = self.generate_diff(old, new, DiffMetadata::default());
        QuickDiff::from_summary(diff.summary)
    }

    /// Per-version change counts across a chronological list of versions.
    ///
    /// The first version is compared against an empty snapshot, so all of its
    /// entries count as added.
    #[must_use]
    pub fn generate_version_stats(
        &self,
        versions: &[(VersionMetadata, MatrixSnapshot)],
    ) -> Vec<VersionChangeStats> {
        let empty = MatrixSnapshot::default();
        let mut previous = &empty;
        let mut stats = Vec::with_capacity(versions.len());

        for (meta, snapshot) in versions {
            let quick = self.generate_quick_diff(previous, snapshot);
            stats.push(VersionChangeStats {
                version: meta.version,
                created_at: meta.created_at,
                created_by: meta.created_by.clone(),
                note: meta.note.clone(),
                added: quick.summary.added,
                removed: quick.summary.removed,
                modified: quick.summary.modified,
                total_entries: snapshot.len(),
                description: quick.description,
            });
            previous = snapshot;
        }

        stats
    }
}
