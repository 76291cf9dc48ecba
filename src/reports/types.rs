//! Report type definitions.

use crate::error::HistoryError;
use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Diff export format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Pretty-printed JSON of the full diff
    #[default]
    Json,
    /// CSV for spreadsheet import
    Csv,
    /// Human-readable Markdown with impact analysis
    #[value(alias = "md")]
    Markdown,
}

impl ReportFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        }
    }

    /// File extension used in export filenames
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "md",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = HistoryError;

    /// Parse an exact lowercase format name.
    ///
    /// Anything else, including other casings, padding and the CLI's `md`
    /// alias, is an unsupported format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "markdown" => Ok(Self::Markdown),
            _ => Err(HistoryError::unsupported_format(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportErrorKind;

    #[test]
    fn test_parse_known_formats() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("csv".parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
        assert_eq!("markdown".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
    }

    #[test]
    fn test_parse_is_exact() {
        for name in ["md", "CSV", " json ", "Markdown", ""] {
            match name.parse::<ReportFormat>() {
                Err(HistoryError::Report {
                    source: ReportErrorKind::UnsupportedFormat(rejected),
                    ..
                }) => assert_eq!(rejected, name),
                other => panic!("{name:?} parsed as {other:?}"),
            }
        }
    }

    #[test]
    fn test_cli_alias_stays_on_value_enum() {
        assert_eq!(<ReportFormat as ValueEnum>::from_str("md", true).unwrap(), ReportFormat::Markdown);
    }

    #[test]
    fn test_parse_unknown_format_fails() {
        let err = "xml".parse::<ReportFormat>().unwrap_err();
        assert!(err.to_string().contains("format 'xml'"));
    }
}
