//! Diff export in JSON, CSV and Markdown.
//!
//! The CSV header and column order are the only bit-exact contract:
//! `"Type","ID","Rule Name","Source","Destination","Action","Changes"`.
//!
//! # Security
//!
//! Rule names and comments are user-entered. The [`escape`] module must be
//! used before embedding them in CSV, HTML or Markdown.

mod csv;
pub mod escape;
mod json;
mod markdown;
mod types;

pub use csv::CsvReporter;
pub use json::JsonReporter;
pub use markdown::MarkdownReporter;
pub use types::ReportFormat;

use crate::diff::MatrixDiff;
use crate::error::Result;
use std::io::Write;

/// Trait for report generators
pub trait ReportGenerator {
    /// Render a diff as text
    fn generate(&self, diff: &MatrixDiff) -> Result<String>;

    /// Write the rendered report to a writer
    fn write_to(&self, diff: &MatrixDiff, writer: &mut dyn Write) -> Result<()> {
        let report = self.generate(diff)?;
        writer.write_all(report.as_bytes())?;
        Ok(())
    }

    /// Get the format this generator produces
    fn format(&self) -> ReportFormat;
}

/// Create a report generator for the given format
#[must_use]
pub fn create_reporter(format: ReportFormat) -> Box<dyn ReportGenerator> {
    match format {
        ReportFormat::Json => Box::new(JsonReporter::new()),
        ReportFormat::Csv => Box::new(CsvReporter::new()),
        ReportFormat::Markdown => Box::new(MarkdownReporter::new()),
    }
}

/// Export a diff in a named format.
///
/// Any name other than exactly `json`, `csv` or `markdown` fails with an
/// unsupported-format error.
pub fn export_diff(diff: &MatrixDiff, format: &str) -> Result<String> {
    let format: ReportFormat = format.parse()?;
    create_reporter(format).generate(diff)
}

/// Download filename for an export, e.g. `matrix-12-diff-v3-to-v4.csv`.
#[must_use]
pub fn export_filename(matrix_id: i64, from_version: u32, to_version: u32, format: ReportFormat) -> String {
    format!(
        "matrix-{matrix_id}-diff-v{from_version}-to-v{to_version}.{}",
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffEngine, DiffMetadata};
    use crate::model::{EntryField, MatrixEntry, MatrixSnapshot};

    fn sample() -> MatrixDiff {
        DiffEngine::new().generate_diff(
            &MatrixSnapshot::default(),
            &MatrixSnapshot::new(vec![MatrixEntry::new(1).with(EntryField::Action, "ALLOW")]),
            DiffMetadata::versions(1, 2),
        )
    }

    #[test]
    fn test_export_json_round_trips() {
        let diff = sample();
        let json = export_diff(&diff, "json").unwrap();
        let parsed: MatrixDiff = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, diff);
        assert!(json.contains("\n  "));
    }

    #[test]
    fn test_export_unsupported_format() {
        let err = export_diff(&sample(), "pdf").unwrap_err();
        assert!(matches!(
            err,
            crate::error::HistoryError::Report {
                source: crate::error::ReportErrorKind::UnsupportedFormat(_),
                ..
            }
        ));
    }

    #[test]
    fn test_write_to_buffer() {
        let mut buffer = Vec::new();
        create_reporter(ReportFormat::Csv)
            .write_to(&sample(), &mut buffer)
            .unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(
            export_filename(12, 3, 4, ReportFormat::Markdown),
            "matrix-12-diff-v3-to-v4.md"
        );
    }
}
