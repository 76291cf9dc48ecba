//! CSV report generator.
//!
//! One row per diff entry, every field double-quoted.

use super::escape::escape_csv;
use super::{ReportFormat, ReportGenerator};
use crate::diff::{DiffEntry, MatrixDiff};
use crate::error::Result;
use std::fmt::Write;

const HEADER: [&str; 7] = [
    "Type",
    "ID",
    "Rule Name",
    "Source",
    "Destination",
    "Action",
    "Changes",
];

/// CSV report generator.
pub struct CsvReporter;

impl CsvReporter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for CsvReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator for CsvReporter {
    fn generate(&self, diff: &MatrixDiff) -> Result<String> {
        let mut content = String::with_capacity(64 * (diff.entries.len() + 1));
        write_row(&mut content, HEADER.iter().copied());

        for entry in &diff.entries {
            let id = entry.id().to_string();
            let changes = entry.changes_text();
            let row = row_for(entry, &id, &changes);
            write_row(&mut content, row.iter().copied());
        }

        Ok(content)
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Csv
    }
}

fn row_for<'a>(diff_entry: &'a DiffEntry, id: &'a str, changes: &'a str) -> [&'a str; 7] {
    let e = &diff_entry.entry;
    [
        diff_entry.change_type.as_str(),
        id,
        e.rule_name.as_deref().unwrap_or(""),
        e.src_name.as_deref().or(e.src_cidr.as_deref()).unwrap_or(""),
        e.dst_name.as_deref().or(e.dst_cidr.as_deref()).unwrap_or(""),
        e.action.as_deref().unwrap_or(""),
        changes,
    ]
}

fn write_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "\"{}\"", escape_csv(field));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffEngine, DiffMetadata};
    use crate::model::{EntryField, MatrixEntry, MatrixSnapshot};

    #[test]
    fn test_header_is_exact() {
        let diff = DiffEngine::new().generate_diff(
            &MatrixSnapshot::default(),
            &MatrixSnapshot::default(),
            DiffMetadata::default(),
        );
        let csv = CsvReporter::new().generate(&diff).unwrap();
        assert_eq!(
            csv,
            "\"Type\",\"ID\",\"Rule Name\",\"Source\",\"Destination\",\"Action\",\"Changes\"\n"
        );
    }

    #[test]
    fn test_rows_are_escaped() {
        let old = MatrixSnapshot::new(vec![MatrixEntry::new(7)
            .with(EntryField::RuleName, "web \"front\"")
            .with(EntryField::SrcCidr, "10.0.0.0/8")
            .with(EntryField::Action, "ALLOW")]);
        let new = MatrixSnapshot::new(vec![MatrixEntry::new(7)
            .with(EntryField::RuleName, "web \"front\"")
            .with(EntryField::SrcCidr, "10.0.0.0/8")
            .with(EntryField::Action, "DENY")]);
        let diff = DiffEngine::new().generate_diff(&old, &new, DiffMetadata::versions(1, 2));
        let csv = CsvReporter::new().generate(&diff).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "\"modified\",\"7\",\"web \"\"front\"\"\",\"10.0.0.0/8\",\"\",\"DENY\",\"action: ALLOW→DENY\""
        );
    }
}
