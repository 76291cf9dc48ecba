//! Typed event payloads.

use crate::diff::{DiffSummary, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle events published per matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    VersionCreated {
        matrix_id: i64,
        version: u32,
        created_by: Option<String>,
    },
    DiffGenerated {
        matrix_id: i64,
        from_version: u32,
        to_version: u32,
        summary: DiffSummary,
        risk_level: Option<RiskLevel>,
    },
    CacheInvalidated {
        matrix_id: i64,
        removed: usize,
    },
}

impl HistoryEvent {
    #[must_use]
    pub const fn matrix_id(&self) -> i64 {
        match self {
            Self::VersionCreated { matrix_id, .. }
            | Self::DiffGenerated { matrix_id, .. }
            | Self::CacheInvalidated { matrix_id, .. } => *matrix_id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VersionCreated { .. } => "version_created",
            Self::DiffGenerated { .. } => "diff_generated",
            Self::CacheInvalidated { .. } => "cache_invalidated",
        }
    }
}

impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionCreated {
                matrix_id, version, ..
            } => write!(f, "matrix {matrix_id}: version {version} created"),
            Self::DiffGenerated {
                matrix_id,
                from_version,
                to_version,
                summary,
                ..
            } => write!(
                f,
                "matrix {matrix_id}: diff v{from_version}..v{to_version} ({} changes)",
                summary.total_changes()
            ),
            Self::CacheInvalidated { matrix_id, removed } => {
                write!(f, "matrix {matrix_id}: {removed} cache entries invalidated")
            }
        }
    }
}

/// An event as delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event: HistoryEvent,
    pub emitted_at: DateTime<Utc>,
}
