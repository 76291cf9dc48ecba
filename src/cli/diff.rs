//! Diff, impact and page command handlers.

use super::{exit_codes, load_snapshot_file, OutputTarget};
use crate::config::PaginationConfig;
use crate::diff::{
    generate_impact_analysis, DiffEngine, DiffMetadata, DiffPaginator, ImpactAnalysis, MatrixDiff,
    PaginationOptions, RiskLevel,
};
use crate::reports::{create_reporter, export_filename, ReportFormat};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Inputs shared by the diff-based commands.
#[derive(Debug, Clone)]
pub struct DiffCommand {
    pub old: PathBuf,
    pub new: PathBuf,
    pub matrix_id: i64,
    pub include_unchanged: bool,
    pub fail_on_critical: bool,
    pub quiet: bool,
}

impl DiffCommand {
    fn compute(&self) -> Result<MatrixDiff> {
        let old = load_snapshot_file(&self.old)?;
        let new = load_snapshot_file(&self.new)?;
        let from = old.metadata(1);
        let to = new.metadata(from.version.saturating_add(1));

        let diff = DiffEngine::new()
            .include_unchanged(self.include_unchanged)
            .generate_diff(
                &old.snapshot.normalized(),
                &new.snapshot.normalized(),
                DiffMetadata::between(&from, &to),
            );
        if !self.quiet {
            tracing::info!(
                "Compared {} entries (v{}) with {} entries (v{})",
                old.snapshot.len(),
                from.version,
                new.snapshot.len(),
                to.version
            );
        }
        Ok(diff)
    }

    const fn exit_code(&self, diff: &MatrixDiff, risk: RiskLevel) -> i32 {
        if self.fail_on_critical && matches!(risk, RiskLevel::Critical) {
            return exit_codes::CRITICAL_RISK;
        }
        if diff.has_changes() {
            return exit_codes::CHANGES_DETECTED;
        }
        exit_codes::SUCCESS
    }
}

/// Run the diff command, returning the exit code.
///
/// With `output_dir`, the export is written there under its conventional
/// file name instead of to `output_file` or stdout.
pub fn run_diff(
    command: &DiffCommand,
    format: ReportFormat,
    output_file: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<i32> {
    let diff = command.compute()?;
    let report = create_reporter(format).generate(&diff)?;

    let target = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            OutputTarget::File(dir.join(export_filename(
                command.matrix_id,
                diff.metadata.from_version,
                diff.metadata.to_version,
                format,
            )))
        }
        None => OutputTarget::from_option(output_file),
    };
    target.write(&report)?;

    let risk = generate_impact_analysis(&diff).risk_level;
    Ok(command.exit_code(&diff, risk))
}

/// Run the impact command, returning the exit code.
pub fn run_impact(command: &DiffCommand, json: bool, output_file: Option<PathBuf>) -> Result<i32> {
    let diff = command.compute()?;
    let impact = generate_impact_analysis(&diff);

    let rendered = if json {
        serde_json::to_string_pretty(&impact)?
    } else {
        render_impact(&impact)
    };
    OutputTarget::from_option(output_file).write(&rendered)?;

    Ok(command.exit_code(&diff, impact.risk_level))
}

fn render_impact(impact: &ImpactAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Risk level: {}", impact.risk_level);
    let list = |set: &std::collections::BTreeSet<String>| {
        if set.is_empty() {
            "none".to_string()
        } else {
            set.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    };
    let _ = writeln!(out, "Impacted zones: {}", list(&impact.impacted_zones));
    let _ = writeln!(out, "Impacted services: {}", list(&impact.impacted_services));
    if !impact.critical_changes.is_empty() {
        let _ = writeln!(out, "\nCritical changes:");
        for change in &impact.critical_changes {
            let _ = writeln!(out, "  - {change}");
        }
    }
    if !impact.recommendations.is_empty() {
        let _ = writeln!(out, "\nRecommendations:");
        for recommendation in &impact.recommendations {
            let _ = writeln!(out, "  - {recommendation}");
        }
    }
    out
}

/// Page selection for the page command.
#[derive(Debug, Clone)]
pub struct PageCommand {
    pub options: PaginationOptions,
    pub pagination: PaginationConfig,
    /// Include render-cost estimates in the output
    pub metrics: bool,
}

/// Run the page command: one JSON page of the diff.
pub fn run_page(command: &DiffCommand, page: &PageCommand, output_file: Option<PathBuf>) -> Result<i32> {
    #[derive(Serialize)]
    struct PageOutput<'a> {
        #[serde(flatten)]
        page: &'a crate::diff::PaginatedDiff,
        #[serde(skip_serializing_if = "Option::is_none")]
        performance: Option<crate::diff::PerformanceMetrics>,
    }

    let diff = command.compute()?;
    let paginator = DiffPaginator::with_config(page.pagination);
    let paginated = paginator.paginate(&diff, &page.options);
    let output = PageOutput {
        page: &paginated,
        performance: page.metrics.then(|| paginator.performance_metrics(&diff)),
    };
    OutputTarget::from_option(output_file).write(&serde_json::to_string_pretty(&output)?)?;

    let risk = generate_impact_analysis(&diff).risk_level;
    Ok(command.exit_code(&diff, risk))
}
