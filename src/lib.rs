//! **Version history engine for flow matrices.**
//!
//! `matrix-history` compares snapshots of a firewall flow matrix, classifies
//! every rule as added, removed, modified or unchanged, and derives what a
//! reviewer needs from that diff: a risk assessment, filterable pages,
//! exports, compressed snapshots for caching and a searchable index.
//!
//! ## Core Concepts & Modules
//!
//! - **[`model`]**: [`MatrixEntry`], [`MatrixSnapshot`] and the typed
//!   [`EntryField`] list every comparison iterates over.
//! - **[`diff`]**: the [`DiffEngine`], impact analysis and the paginator.
//! - **[`reports`]**: JSON, CSV and Markdown exports of a diff.
//! - **[`compression`]**: dictionary plus columnar gzip encoding of snapshots
//!   with checksum verification.
//! - **[`cache`]**: the key/value store contract and the typed
//!   [`HistoryCache`] that degrades to misses instead of failing.
//! - **[`search`]**: per-matrix inverted indexes with scored, fuzzy and
//!   prefix queries.
//! - **[`realtime`]**: rate-limited publish/subscribe of lifecycle events.
//! - **[`service`]**: [`VersionHistoryService`], which wires a snapshot
//!   source, the cache, the engine and the notifier together.
//!
//! ## Diffing Two Snapshots
//!
//! ```
//! use matrix_history::{generate_impact_analysis, DiffEngine, RiskLevel};
//! use matrix_history::diff::DiffMetadata;
//! use matrix_history::model::{EntryField, MatrixEntry, MatrixSnapshot};
//!
//! let old = MatrixSnapshot::new(vec![
//!     MatrixEntry::new(1).with(EntryField::Action, "ALLOW"),
//! ]);
//! let new = MatrixSnapshot::new(vec![
//!     MatrixEntry::new(1).with(EntryField::Action, "DENY"),
//! ]);
//!
//! let diff = DiffEngine::new().generate_diff(&old, &new, DiffMetadata::versions(1, 2));
//! assert_eq!(diff.summary.modified, 1);
//!
//! let impact = generate_impact_analysis(&diff);
//! assert_eq!(impact.risk_level, RiskLevel::Critical);
//! ```
//!
//! ## Exporting
//!
//! ```
//! use matrix_history::{export_diff, DiffEngine};
//! use matrix_history::diff::DiffMetadata;
//! use matrix_history::model::MatrixSnapshot;
//!
//! let diff = DiffEngine::new().generate_diff(
//!     &MatrixSnapshot::default(),
//!     &MatrixSnapshot::default(),
//!     DiffMetadata::default(),
//! );
//! let csv = export_diff(&diff, "csv").unwrap();
//! assert!(csv.starts_with("\"Type\",\"ID\""));
//! assert!(export_diff(&diff, "xlsx").is_err());
//! ```

// Lint to discourage unwrap() in production code - prefer explicit error handling
#![warn(clippy::unwrap_used)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::similar_names
)]

pub mod cache;
pub mod cli;
pub mod compression;
pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod realtime;
pub mod reports;
pub mod search;
pub mod service;
pub mod utils;

// Re-export main types for convenience
pub use cache::{CacheLookup, CacheWrite, HistoryCache, KeyValueCache, MemoryCache};
pub use compression::{CompressedSnapshot, SnapshotCompressor};
pub use config::{AppConfig, AppConfigBuilder, ConfigError, ConfigPreset, Validatable};
pub use diff::{
    generate_impact_analysis, DiffEngine, DiffPaginator, ImpactAnalysis, MatrixDiff,
    PaginationOptions, RiskLevel,
};
pub use error::{ErrorContext, HistoryError, OptionContext, Result};
pub use model::{EntryField, MatrixEntry, MatrixSnapshot, VersionMetadata};
pub use realtime::{HistoryEvent, Notifier};
pub use reports::{export_diff, ReportFormat, ReportGenerator};
pub use search::{SearchEngine, SearchOptions, SearchResult};
pub use service::{SnapshotSource, VersionHistoryService};
