//! JSON report generator.

use super::{ReportFormat, ReportGenerator};
use crate::diff::MatrixDiff;
use crate::error::Result;

/// JSON report generator
pub struct JsonReporter {
    /// Pretty print output
    pretty: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter
    #[must_use]
    pub const fn new() -> Self {
        Self { pretty: true }
    }

    /// Set pretty printing
    #[must_use]
    pub const fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator for JsonReporter {
    fn generate(&self, diff: &MatrixDiff) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(diff)?
        } else {
            serde_json::to_string(diff)?
        };
        Ok(json)
    }

    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }
}
