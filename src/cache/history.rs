//! Caching façade for history artifacts.
//!
//! Every read degrades to a miss when the store fails or returns an
//! undecodable payload; every write failure is logged and reported as
//! [`CacheWrite::Degraded`], never as an error.

use super::compact::{CompactDiff, CompactVersionStats};
use super::store::KeyValueCache;
use crate::compression::{pack_json, unpack_json, SnapshotCompressor};
use crate::config::{CacheConfig, CompressionConfig};
use crate::diff::{HistoryStats, ImpactAnalysis, MatrixDiff, VersionChangeStats};
use crate::error::Result;
use crate::model::MatrixSnapshot;
use crate::reports::ReportFormat;
use crate::utils::content_hash;
use std::sync::Arc;
use std::time::Duration;

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    /// The store failed or held garbage; treat as a miss
    Degraded(String),
}

impl<T> CacheLookup<T> {
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss | Self::Degraded(_) => None,
        }
    }

    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Result of a cache write or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    Stored,
    Degraded(String),
}

impl CacheWrite {
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

/// Outcome of an invalidation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub removed: usize,
    /// Patterns whose deletion failed
    pub degraded: Vec<String>,
}

/// Artifact kinds, each with its own key segment and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Snapshot,
    Diff,
    Timeline,
    Stats,
    Impact,
    Export,
}

impl ArtifactKind {
    pub const ALL: [Self; 6] = [
        Self::Snapshot,
        Self::Diff,
        Self::Timeline,
        Self::Stats,
        Self::Impact,
        Self::Export,
    ];

    /// Kinds made stale by appending a version to the history.
    pub const EXTENDED_BY_NEW_VERSION: [Self; 4] =
        [Self::Timeline, Self::Stats, Self::Diff, Self::Impact];

    #[must_use]
    pub const fn segment(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Diff => "diff",
            Self::Timeline => "timeline",
            Self::Stats => "stats",
            Self::Impact => "impact",
            Self::Export => "export",
        }
    }

    const fn ttl(self, config: &CacheConfig) -> Duration {
        match self {
            Self::Snapshot => config.snapshot_ttl(),
            Self::Diff => config.diff_ttl(),
            Self::Timeline => config.timeline_ttl(),
            Self::Stats => config.stats_ttl(),
            Self::Impact => config.impact_ttl(),
            Self::Export => config.export_ttl(),
        }
    }
}

/// Typed cache for snapshots, diffs, timelines, stats, impact and exports.
#[derive(Clone)]
pub struct HistoryCache {
    store: Arc<dyn KeyValueCache>,
    config: CacheConfig,
    compressor: SnapshotCompressor,
    level: u32,
}

impl HistoryCache {
    pub fn new(store: Arc<dyn KeyValueCache>, config: CacheConfig) -> Self {
        Self::with_compression(store, config, CompressionConfig::default())
    }

    pub fn with_compression(
        store: Arc<dyn KeyValueCache>,
        config: CacheConfig,
        compression: CompressionConfig,
    ) -> Self {
        Self {
            store,
            config,
            level: compression.level,
            compressor: SnapshotCompressor::with_config(compression),
        }
    }

    // ========================================================================
    // Keys
    // ========================================================================

    fn key(&self, kind: ArtifactKind, rest: std::fmt::Arguments<'_>) -> String {
        format!("{}:{}:{rest}", self.config.key_prefix, kind.segment())
    }

    #[must_use]
    pub fn snapshot_key(&self, matrix_id: i64, version: u32) -> String {
        self.key(ArtifactKind::Snapshot, format_args!("{matrix_id}:{version}"))
    }

    #[must_use]
    pub fn diff_key(&self, matrix_id: i64, from: u32, to: u32) -> String {
        self.key(ArtifactKind::Diff, format_args!("{matrix_id}:{from}:{to}"))
    }

    #[must_use]
    pub fn timeline_key(&self, matrix_id: i64) -> String {
        self.key(ArtifactKind::Timeline, format_args!("{matrix_id}"))
    }

    #[must_use]
    pub fn stats_key(&self, matrix_id: i64) -> String {
        self.key(ArtifactKind::Stats, format_args!("{matrix_id}"))
    }

    #[must_use]
    pub fn impact_key(&self, matrix_id: i64, from: u32, to: u32) -> String {
        self.key(ArtifactKind::Impact, format_args!("{matrix_id}:{from}:{to}"))
    }

    /// Content-addressed export key: a hash of `(matrix, from, to, format)`.
    #[must_use]
    pub fn export_key(&self, matrix_id: i64, from: u32, to: u32, format: ReportFormat) -> String {
        let hash = content_hash(format!("{matrix_id}:{from}:{to}:{format}").as_bytes());
        self.key(ArtifactKind::Export, format_args!("{matrix_id}:{hash:016x}"))
    }

    // ========================================================================
    // Typed accessors
    // ========================================================================

    pub async fn get_snapshot(&self, matrix_id: i64, version: u32) -> CacheLookup<MatrixSnapshot> {
        let key = self.snapshot_key(matrix_id, version);
        self.read(&key, |text| self.compressor.decompress_from_cache(text))
            .await
    }

    pub async fn set_snapshot(&self, matrix_id: i64, version: u32, snapshot: &MatrixSnapshot) -> CacheWrite {
        let key = self.snapshot_key(matrix_id, version);
        let encoded = self.compressor.compress_for_cache(snapshot);
        self.write(&key, encoded, ArtifactKind::Snapshot).await
    }

    pub async fn get_diff(&self, matrix_id: i64, from: u32, to: u32) -> CacheLookup<MatrixDiff> {
        let key = self.diff_key(matrix_id, from, to);
        self.read(&key, |text| unpack_json::<CompactDiff>(text).map(CompactDiff::into_diff))
            .await
    }

    pub async fn set_diff(&self, matrix_id: i64, from: u32, to: u32, diff: &MatrixDiff) -> CacheWrite {
        let key = self.diff_key(matrix_id, from, to);
        let encoded = pack_json(&CompactDiff::from(diff), self.level);
        self.write(&key, encoded, ArtifactKind::Diff).await
    }

    pub async fn get_timeline(&self, matrix_id: i64) -> CacheLookup<Vec<VersionChangeStats>> {
        let key = self.timeline_key(matrix_id);
        self.read(&key, |text| {
            unpack_json::<Vec<CompactVersionStats>>(text)
                .map(|rows| rows.into_iter().map(VersionChangeStats::from).collect())
        })
        .await
    }

    pub async fn set_timeline(&self, matrix_id: i64, timeline: &[VersionChangeStats]) -> CacheWrite {
        let key = self.timeline_key(matrix_id);
        let rows: Vec<CompactVersionStats> = timeline.iter().map(CompactVersionStats::from).collect();
        let encoded = pack_json(&rows, self.level);
        self.write(&key, encoded, ArtifactKind::Timeline).await
    }

    pub async fn get_stats(&self, matrix_id: i64) -> CacheLookup<HistoryStats> {
        let key = self.stats_key(matrix_id);
        self.read(&key, unpack_json).await
    }

    pub async fn set_stats(&self, matrix_id: i64, stats: &HistoryStats) -> CacheWrite {
        let key = self.stats_key(matrix_id);
        self.write(&key, pack_json(stats, self.level), ArtifactKind::Stats)
            .await
    }

    pub async fn get_impact(&self, matrix_id: i64, from: u32, to: u32) -> CacheLookup<ImpactAnalysis> {
        let key = self.impact_key(matrix_id, from, to);
        self.read(&key, unpack_json).await
    }

    pub async fn set_impact(
        &self,
        matrix_id: i64,
        from: u32,
        to: u32,
        impact: &ImpactAnalysis,
    ) -> CacheWrite {
        let key = self.impact_key(matrix_id, from, to);
        self.write(&key, pack_json(impact, self.level), ArtifactKind::Impact)
            .await
    }

    pub async fn get_export(
        &self,
        matrix_id: i64,
        from: u32,
        to: u32,
        format: ReportFormat,
    ) -> CacheLookup<String> {
        let key = self.export_key(matrix_id, from, to, format);
        self.read(&key, unpack_json).await
    }

    pub async fn set_export(
        &self,
        matrix_id: i64,
        from: u32,
        to: u32,
        format: ReportFormat,
        content: &str,
    ) -> CacheWrite {
        let key = self.export_key(matrix_id, from, to, format);
        self.write(&key, pack_json(&content, self.level), ArtifactKind::Export)
            .await
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Remove every cached artifact of a matrix.
    pub async fn invalidate_matrix_history(&self, matrix_id: i64) -> Invalidation {
        self.invalidate(matrix_id, &ArtifactKind::ALL).await
    }

    /// Remove what a new version makes stale: timeline, stats, diffs and
    /// impact. Snapshots and exports of existing versions stay valid.
    pub async fn invalidate_after_new_version(&self, matrix_id: i64) -> Invalidation {
        self.invalidate(matrix_id, &ArtifactKind::EXTENDED_BY_NEW_VERSION)
            .await
    }

    async fn invalidate(&self, matrix_id: i64, kinds: &[ArtifactKind]) -> Invalidation {
        let mut outcome = Invalidation::default();
        for kind in kinds {
            let exact = self.key(*kind, format_args!("{matrix_id}"));
            let pattern = format!("{exact}:*");

            match self.store.del(&exact).await {
                Ok(existed) => outcome.removed += usize::from(existed),
                Err(e) => {
                    tracing::warn!(key = %exact, error = %e, "Cache delete failed");
                    outcome.degraded.push(exact);
                }
            }
            match self.store.del_pattern(&pattern).await {
                Ok(count) => outcome.removed += count,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Cache pattern delete failed");
                    outcome.degraded.push(pattern);
                }
            }
        }
        tracing::debug!(
            matrix_id,
            removed = outcome.removed,
            degraded = outcome.degraded.len(),
            "Invalidated cached history"
        );
        outcome
    }

    /// Diagnostic text from the store.
    pub async fn info(&self) -> CacheLookup<String> {
        match self.store.info().await {
            Ok(info) => CacheLookup::Hit(info),
            Err(e) => CacheLookup::Degraded(e.to_string()),
        }
    }

    // ========================================================================
    // Degrading read/write
    // ========================================================================

    async fn read<T, F>(&self, key: &str, decode: F) -> CacheLookup<T>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        match self.store.get(key).await {
            Ok(Some(text)) => match decode(&text) {
                Ok(value) => {
                    tracing::trace!(key, "Cache hit");
                    CacheLookup::Hit(value)
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                    if let Err(del_err) = self.store.del(key).await {
                        tracing::debug!(key, error = %del_err, "Failed to drop bad cache entry");
                    }
                    CacheLookup::Degraded(e.to_string())
                }
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                CacheLookup::Degraded(e.to_string())
            }
        }
    }

    async fn write(&self, key: &str, encoded: Result<String>, kind: ArtifactKind) -> CacheWrite {
        let text = match encoded {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to encode cache entry");
                return CacheWrite::Degraded(e.to_string());
            }
        };
        match self.store.set(key, text, Some(kind.ttl(&self.config))).await {
            Ok(()) => CacheWrite::Stored,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache write failed");
                CacheWrite::Degraded(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for HistoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryCache")
            .field("key_prefix", &self.config.key_prefix)
            .finish_non_exhaustive()
    }
}
