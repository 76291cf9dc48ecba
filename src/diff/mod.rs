//! Version diffing for firewall matrices.
//!
//! Snapshots are correlated entry by entry on their numeric id.
//!
//! - [`DiffEngine`]: full, quick and timeline comparisons
//! - [`generate_impact_analysis`]: risk rating of a computed diff
//! - [`DiffPaginator`]: filter, sort and page through large diffs
//!
//! # Example
//!
//! ```
//! use matrix_history::diff::{DiffEngine, DiffMetadata};
//! use matrix_history::model::{EntryField, MatrixEntry, MatrixSnapshot};
//!
//! let old = MatrixSnapshot::new(vec![MatrixEntry::new(1).with(EntryField::Action, "ALLOW")]);
//! let new = MatrixSnapshot::new(vec![MatrixEntry::new(1).with(EntryField::Action, "DENY")]);
//!
//! let diff = DiffEngine::new().generate_diff(&old, &new, DiffMetadata::versions(1, 2));
//! assert_eq!(diff.summary.modified, 1);
//! ```

mod engine;
pub mod impact;
pub mod paginate;
mod result;

pub use engine::DiffEngine;
pub use impact::{generate_impact_analysis, ImpactAnalysis, RiskLevel};
pub use paginate::{
    DiffFilters, DiffPaginator, ImpactLevel, PaginatedDiff, PaginatedSummary, PaginationInfo,
    PaginationOptions, PerformanceMetrics, SortBy, SortOrder,
};
pub use result::{
    ChangeType, DiffEntry, DiffMetadata, DiffSummary, FieldChange, HistoryStats, MatrixDiff,
    QuickDiff, VersionChangeStats,
};
