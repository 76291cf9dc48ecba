//! Diff result structures.

use crate::model::{ActionClass, EntryField, MatrixEntry, VersionMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Complete result of comparing two matrix snapshots.
///
/// Derived data: it may be cached, but can always be recomputed from the
/// two snapshots it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct MatrixDiff {
    /// Per-type counts over `entries`
    pub summary: DiffSummary,
    /// New-snapshot entries in snapshot order, then removed entries in old-snapshot order
    pub entries: Vec<DiffEntry>,
    /// Descriptive version information
    pub metadata: DiffMetadata,
}

impl MatrixDiff {
    /// Build a diff from classified entries, computing the summary.
    pub fn from_entries(entries: Vec<DiffEntry>, metadata: DiffMetadata) -> Self {
        Self {
            summary: DiffSummary::from_entries(&entries),
            entries,
            metadata,
        }
    }

    /// Check if any entry was added, removed or modified
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.summary.total_changes() > 0
    }

    /// Find the diff entry for a rule id
    #[must_use]
    pub fn find_entry(&self, id: i64) -> Option<&DiffEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Entries that are not `unchanged`
    pub fn changed_entries(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries
            .iter()
            .filter(|e| e.change_type != ChangeType::Unchanged)
    }

    /// Entries of one type
    pub fn entries_of(&self, change_type: ChangeType) -> impl Iterator<Item = &DiffEntry> {
        self.entries
            .iter()
            .filter(move |e| e.change_type == change_type)
    }
}

/// Counts per change type. `added + removed + modified + unchanged == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub total: usize,
}

impl DiffSummary {
    /// Count a list of diff entries.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DiffEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.record(entry.change_type);
        }
        summary
    }

    /// Count one more entry of the given type.
    pub fn record(&mut self, change_type: ChangeType) {
        match change_type {
            ChangeType::Added => self.added += 1,
            ChangeType::Removed => self.removed += 1,
            ChangeType::Modified => self.modified += 1,
            ChangeType::Unchanged => self.unchanged += 1,
        }
        self.total += 1;
    }

    /// Added + removed + modified.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.added + self.removed + self.modified
    }

    /// Whether the per-type counts sum to `total`.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.added + self.removed + self.modified + self.unchanged == self.total
    }
}

/// Version information the diff was computed between. Purely descriptive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffMetadata {
    pub from_version: u32,
    pub to_version: u32,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub from_created_by: Option<String>,
    pub to_created_by: Option<String>,
}

impl DiffMetadata {
    /// Metadata between two recorded versions.
    pub fn between(from: &VersionMetadata, to: &VersionMetadata) -> Self {
        Self {
            from_version: from.version,
            to_version: to.version,
            from_date: Some(from.created_at),
            to_date: Some(to.created_at),
            from_created_by: from.created_by.clone(),
            to_created_by: to.created_by.clone(),
        }
    }

    /// Metadata carrying only version numbers.
    #[must_use]
    pub fn versions(from_version: u32, to_version: u32) -> Self {
        Self {
            from_version,
            to_version,
            ..Default::default()
        }
    }
}

/// Type of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl ChangeType {
    pub const ALL: [Self; 4] = [Self::Added, Self::Removed, Self::Modified, Self::Unchanged];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        }
    }

    /// Parse from a label, case-insensitively.
    #[must_use]
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "modified" => Some(Self::Modified),
            "unchanged" => Some(Self::Unchanged),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One differing attribute between the old and new entry.
///
/// Only constructed through [`FieldChange::between`], which refuses no-op changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: EntryField,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
}

impl FieldChange {
    /// A change for `field`, or `None` when both values are equal.
    #[must_use]
    pub fn between(field: EntryField, old: Option<&str>, new: Option<&str>) -> Option<Self> {
        (old != new).then(|| Self {
            field,
            old_value: old.map(str::to_string),
            new_value: new.map(str::to_string),
            change_type: ChangeType::Modified,
        })
    }

    /// Whether this change flips an allow action into a deny action.
    #[must_use]
    pub fn is_allow_to_deny(&self) -> bool {
        self.field == EntryField::Action
            && ActionClass::is_allow_to_deny(self.old_value.as_deref(), self.new_value.as_deref())
    }
}

impl fmt::Display for FieldChange {
    /// `field: old→new`, with missing values rendered empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}→{}",
            self.field,
            self.old_value.as_deref().unwrap_or(""),
            self.new_value.as_deref().unwrap_or("")
        )
    }
}

/// Classification of one rule between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// The new entry, or the old one for removals
    pub entry: MatrixEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_entry: Option<MatrixEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_entry: Option<MatrixEntry>,
    /// Field changes; non-empty exactly when `change_type` is `Modified`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

impl DiffEntry {
    /// An entry only present in the new snapshot
    pub fn added(entry: &MatrixEntry) -> Self {
        Self {
            change_type: ChangeType::Added,
            entry: entry.clone(),
            old_entry: None,
            new_entry: Some(entry.clone()),
            changes: Vec::new(),
        }
    }

    /// An entry only present in the old snapshot
    pub fn removed(entry: &MatrixEntry) -> Self {
        Self {
            change_type: ChangeType::Removed,
            entry: entry.clone(),
            old_entry: Some(entry.clone()),
            new_entry: None,
            changes: Vec::new(),
        }
    }

    /// Compare two versions of the same rule field by field.
    ///
    /// Yields `Modified` when at least one field differs, `Unchanged` otherwise.
    pub fn compared(old: &MatrixEntry, new: &MatrixEntry) -> Self {
        let changes: Vec<FieldChange> = EntryField::ALL
            .into_iter()
            .filter_map(|field| FieldChange::between(field, old.get(field), new.get(field)))
            .collect();
        let change_type = if changes.is_empty() {
            ChangeType::Unchanged
        } else {
            ChangeType::Modified
        };
        Self {
            change_type,
            entry: new.clone(),
            old_entry: Some(old.clone()),
            new_entry: Some(new.clone()),
            changes,
        }
    }

    /// Rule id this entry describes
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.entry.id
    }

    /// Whether the `action` field changed
    #[must_use]
    pub fn has_action_change(&self) -> bool {
        self.changes.iter().any(|c| c.field == EntryField::Action)
    }

    /// Whether any change flips an allow action into a deny action
    #[must_use]
    pub fn flips_allow_to_deny(&self) -> bool {
        self.changes.iter().any(FieldChange::is_allow_to_deny)
    }

    /// All field changes flattened as `field: old→new; ...`
    #[must_use]
    pub fn changes_text(&self) -> String {
        self.changes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Glance-level summary of a diff, used for version-list badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickDiff {
    pub summary: DiffSummary,
    pub description: String,
    pub has_changes: bool,
}

impl QuickDiff {
    /// Describe a summary as `"2 added, 1 modified"` or `"No changes"`.
    #[must_use]
    pub fn from_summary(summary: DiffSummary) -> Self {
        let parts: Vec<String> = [
            (summary.added, "added"),
            (summary.modified, "modified"),
            (summary.removed, "removed"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{count} {label}"))
        .collect();

        let has_changes = !parts.is_empty();
        let description = if has_changes {
            parts.join(", ")
        } else {
            "No changes".to_string()
        };
        Self {
            summary,
            description,
            has_changes,
        }
    }
}

/// Change counts for one version relative to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChangeStats {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub note: Option<String>,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub total_entries: usize,
    pub description: String,
}

impl VersionChangeStats {
    /// Total of added, removed and modified
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

/// Aggregate figures over a matrix's whole version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_versions: usize,
    pub total_added: usize,
    pub total_removed: usize,
    pub total_modified: usize,
    pub average_changes_per_version: f64,
    /// Version with the most changes; the earliest wins ties
    pub most_active_version: Option<u32>,
    /// Author whose versions carry the most changes; alphabetical on ties
    pub most_active_author: Option<String>,
    pub first_version_at: Option<DateTime<Utc>>,
    pub last_version_at: Option<DateTime<Utc>>,
    pub contributors: Vec<String>,
    /// Entry count of the latest version
    pub current_entries: usize,
}

impl HistoryStats {
    /// Fold a per-version timeline into totals.
    #[must_use]
    pub fn from_timeline(timeline: &[VersionChangeStats]) -> Self {
        let total_added = timeline.iter().map(|v| v.added).sum();
        let total_removed = timeline.iter().map(|v| v.removed).sum();
        let total_modified = timeline.iter().map(|v| v.modified).sum();
        let total_changes: usize = timeline.iter().map(VersionChangeStats::total_changes).sum();

        let most_active_version = timeline
            .iter()
            .filter(|v| v.total_changes() > 0)
            .fold(None::<&VersionChangeStats>, |best, v| match best {
                Some(b) if b.total_changes() >= v.total_changes() => Some(b),
                _ => Some(v),
            })
            .map(|v| v.version);

        let mut changes_by_author: BTreeMap<&str, usize> = BTreeMap::new();
        for v in timeline {
            if let Some(author) = v.created_by.as_deref() {
                *changes_by_author.entry(author).or_default() += v.total_changes();
            }
        }
        let most_active_author = changes_by_author
            .iter()
            .fold(None::<(&str, usize)>, |best, (author, changes)| match best {
                Some((_, top)) if top >= *changes => best,
                _ => Some((*author, *changes)),
            })
            .map(|(author, _)| author.to_string());
        let contributors = changes_by_author.keys().map(|a| (*a).to_string()).collect();

        Self {
            total_versions: timeline.len(),
            total_added,
            total_removed,
            total_modified,
            average_changes_per_version: if timeline.is_empty() {
                0.0
            } else {
                total_changes as f64 / timeline.len() as f64
            },
            most_active_version,
            most_active_author,
            first_version_at: timeline.iter().map(|v| v.created_at).min(),
            last_version_at: timeline.iter().map(|v| v.created_at).max(),
            contributors,
            current_entries: timeline.last().map_or(0, |v| v.total_entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, action: &str) -> MatrixEntry {
        MatrixEntry::new(id)
            .with(EntryField::Action, action)
            .with(EntryField::RuleName, format!("R{id}"))
    }

    #[test]
    fn test_field_change_refuses_noop() {
        assert!(FieldChange::between(EntryField::Action, Some("ALLOW"), Some("ALLOW")).is_none());
        assert!(FieldChange::between(EntryField::Action, None, None).is_none());
        assert!(FieldChange::between(EntryField::Action, None, Some("")).is_some());
    }

    #[test]
    fn test_compared_identical_is_unchanged() {
        let e = entry(1, "ALLOW");
        let diff_entry = DiffEntry::compared(&e, &e);
        assert_eq!(diff_entry.change_type, ChangeType::Unchanged);
        assert!(diff_entry.changes.is_empty());
    }

    #[test]
    fn test_compared_ignores_timestamps() {
        let old = entry(1, "ALLOW");
        let mut new = old.clone();
        new.updated_at = Some(Utc::now());
        assert_eq!(DiffEntry::compared(&old, &new).change_type, ChangeType::Unchanged);
    }

    #[test]
    fn test_compared_flags_action_flip() {
        let diff_entry = DiffEntry::compared(&entry(1, "ALLOW"), &entry(1, "DENY"));
        assert_eq!(diff_entry.change_type, ChangeType::Modified);
        assert!(diff_entry.has_action_change());
        assert!(diff_entry.flips_allow_to_deny());
        assert_eq!(diff_entry.changes_text(), "action: ALLOW→DENY");
    }

    #[test]
    fn test_summary_consistency() {
        let entries = vec![
            DiffEntry::added(&entry(1, "ALLOW")),
            DiffEntry::removed(&entry(2, "ALLOW")),
            DiffEntry::compared(&entry(3, "ALLOW"), &entry(3, "ALLOW")),
        ];
        let summary = DiffSummary::from_entries(&entries);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.total_changes(), 2);
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_quick_diff_description() {
        let quick = QuickDiff::from_summary(DiffSummary {
            added: 2,
            removed: 1,
            modified: 0,
            unchanged: 4,
            total: 7,
        });
        assert!(quick.has_changes);
        assert_eq!(quick.description, "2 added, 1 removed");

        let none = QuickDiff::from_summary(DiffSummary::default());
        assert!(!none.has_changes);
        assert_eq!(none.description, "No changes");
    }

    #[test]
    fn test_diff_entry_serializes_type_tag() {
        let json = serde_json::to_value(DiffEntry::added(&entry(5, "ALLOW"))).expect("serialize");
        assert_eq!(json["type"], "added");
        assert!(json.get("old_entry").is_none());
        assert!(json.get("changes").is_none());
    }

    #[test]
    fn test_history_stats_from_timeline() {
        let stat = |version, added, modified, by: &str| VersionChangeStats {
            version,
            created_at: Utc::now(),
            created_by: Some(by.to_string()),
            note: None,
            added,
            removed: 0,
            modified,
            total_entries: 10,
            description: String::new(),
        };
        let timeline = vec![stat(1, 3, 0, "bob"), stat(2, 1, 4, "alice"), stat(3, 5, 0, "bob")];
        let stats = HistoryStats::from_timeline(&timeline);
        assert_eq!(stats.total_versions, 3);
        assert_eq!(stats.total_added, 9);
        assert_eq!(stats.most_active_version, Some(2));
        assert_eq!(stats.contributors, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(stats.most_active_author.as_deref(), Some("bob"));
        assert!((stats.average_changes_per_version - 13.0 / 3.0).abs() < f64::EPSILON);

        let empty = HistoryStats::from_timeline(&[]);
        assert_eq!(empty.most_active_version, None);
        assert_eq!(empty.current_entries, 0);
    }
}
