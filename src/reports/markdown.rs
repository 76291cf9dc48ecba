//! Markdown report generator.

use super::escape::{escape_markdown_list, escape_markdown_table};
use super::{ReportFormat, ReportGenerator};
use crate::diff::{generate_impact_analysis, ChangeType, MatrixDiff};
use crate::error::Result;
use std::fmt::Write;

/// Markdown report generator
pub struct MarkdownReporter {
    /// Append a table of changed entries after the analysis sections
    include_details: bool,
}

impl MarkdownReporter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            include_details: false,
        }
    }

    /// Include a per-entry table of changed rules.
    #[must_use]
    pub const fn include_details(mut self, include: bool) -> Self {
        self.include_details = include;
        self
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator for MarkdownReporter {
    fn generate(&self, diff: &MatrixDiff) -> Result<String> {
        let impact = generate_impact_analysis(diff);
        let meta = &diff.metadata;
        let mut md = String::new();

        writeln!(
            md,
            "# Matrix Diff: v{} → v{}\n",
            meta.from_version, meta.to_version
        )?;

        md.push_str("## Summary\n\n");
        md.push_str("| Change | Count |\n|--------|-------|\n");
        for (label, count) in [
            ("Added", diff.summary.added),
            ("Removed", diff.summary.removed),
            ("Modified", diff.summary.modified),
            ("Unchanged", diff.summary.unchanged),
        ] {
            writeln!(md, "| {label} | {count} |")?;
        }
        md.push('\n');

        md.push_str("## Impact Analysis\n\n");
        writeln!(md, "- **Risk level:** {}", impact.risk_level)?;
        writeln!(md, "- **Impacted zones:** {}", joined(&impact.impacted_zones))?;
        writeln!(md, "- **Impacted services:** {}", joined(&impact.impacted_services))?;
        md.push('\n');

        if !impact.critical_changes.is_empty() {
            md.push_str("## Critical Changes\n\n");
            for change in &impact.critical_changes {
                writeln!(md, "- {}", escape_markdown_list(change))?;
            }
            md.push('\n');
        }

        if !impact.recommendations.is_empty() {
            md.push_str("## Recommendations\n\n");
            for recommendation in &impact.recommendations {
                writeln!(md, "- {}", escape_markdown_list(recommendation))?;
            }
            md.push('\n');
        }

        if self.include_details && diff.has_changes() {
            md.push_str("## Changed Rules\n\n");
            md.push_str("| Type | ID | Rule Name | Changes |\n|------|----|-----------|---------|\n");
            for entry in diff.changed_entries() {
                let changes = if entry.change_type == ChangeType::Modified {
                    entry.changes_text()
                } else {
                    "-".to_string()
                };
                writeln!(
                    md,
                    "| {} | {} | {} | {} |",
                    entry.change_type,
                    entry.id(),
                    escape_markdown_table(&entry.entry.label()),
                    escape_markdown_table(&changes)
                )?;
            }
        }

        Ok(md)
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Markdown
    }
}

fn joined<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    let list: Vec<String> = values
        .into_iter()
        .map(|v| escape_markdown_list(v))
        .collect();
    if list.is_empty() {
        "none".to_string()
    } else {
        list.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffEngine, DiffMetadata};
    use crate::model::{EntryField, MatrixEntry, MatrixSnapshot};

    fn rule(id: i64, action: &str) -> MatrixEntry {
        MatrixEntry::new(id)
            .with(EntryField::Action, action)
            .with(EntryField::RuleName, format!("R{id}"))
            .with(EntryField::DstZone, "dmz")
    }

    #[test]
    fn test_sections_present_for_critical_diff() {
        let diff = DiffEngine::new().generate_diff(
            &MatrixSnapshot::new(vec![rule(1, "ALLOW")]),
            &MatrixSnapshot::new(vec![rule(1, "DENY")]),
            DiffMetadata::versions(3, 4),
        );
        let md = MarkdownReporter::new().generate(&diff).unwrap();
        assert!(md.starts_with("# Matrix Diff: v3 → v4"));
        assert!(md.contains("## Summary"));
        assert!(md.contains("| Modified | 1 |"));
        assert!(md.contains("**Risk level:** critical"));
        assert!(md.contains("## Critical Changes"));
        assert!(md.contains("## Recommendations"));
        assert!(md.contains("dmz"));
    }

    #[test]
    fn test_empty_sections_omitted() {
        let snapshot = MatrixSnapshot::new(vec![rule(1, "ALLOW")]);
        let diff = DiffEngine::new().generate_diff(&snapshot, &snapshot, DiffMetadata::versions(1, 2));
        let md = MarkdownReporter::new().include_details(true).generate(&diff).unwrap();
        assert!(!md.contains("## Critical Changes"));
        assert!(!md.contains("## Recommendations"));
        assert!(!md.contains("## Changed Rules"));
        assert!(md.contains("**Impacted zones:** none"));
    }

    #[test]
    fn test_details_table() {
        let diff = DiffEngine::new().generate_diff(
            &MatrixSnapshot::default(),
            &MatrixSnapshot::new(vec![rule(9, "ALLOW")]),
            DiffMetadata::versions(1, 2),
        );
        let md = MarkdownReporter::new().include_details(true).generate(&diff).unwrap();
        assert!(md.contains("| added | 9 | R9 | - |"));
    }
}
