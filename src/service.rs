//! Version history service: snapshot source, cache, diff engine and
//! notifier wired together.
//!
//! Every read goes cache first and falls back to computing from snapshots.
//! Two callers racing on the same artifact may both compute it; the engine
//! is deterministic, so the last write wins harmlessly.

use crate::cache::{CacheLookup, HistoryCache, Invalidation, KeyValueCache};
use crate::config::AppConfig;
use crate::diff::{
    generate_impact_analysis, DiffEngine, DiffMetadata, HistoryStats, ImpactAnalysis, MatrixDiff,
    VersionChangeStats,
};
use crate::error::{HistoryError, Result};
use crate::model::{MatrixSnapshot, VersionMetadata};
use crate::realtime::Notifier;
use crate::reports::{create_reporter, ReportFormat};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence collaborator that owns the snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load_snapshot(&self, matrix_id: i64, version: u32) -> Result<MatrixSnapshot>;

    async fn version_metadata(&self, matrix_id: i64, version: u32) -> Result<VersionMetadata>;

    /// Metadata of every version, oldest first.
    async fn list_versions(&self, matrix_id: i64) -> Result<Vec<VersionMetadata>>;
}

/// In-process [`SnapshotSource`].
#[derive(Debug, Default)]
pub struct MemorySnapshotSource {
    versions: RwLock<BTreeMap<(i64, u32), (VersionMetadata, MatrixSnapshot)>>,
}

impl MemorySnapshotSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a version, replacing one with the same number.
    pub async fn insert(&self, matrix_id: i64, metadata: VersionMetadata, snapshot: MatrixSnapshot) {
        self.versions
            .write()
            .await
            .insert((matrix_id, metadata.version), (metadata, snapshot));
    }
}

#[async_trait]
impl SnapshotSource for MemorySnapshotSource {
    async fn load_snapshot(&self, matrix_id: i64, version: u32) -> Result<MatrixSnapshot> {
        self.versions
            .read()
            .await
            .get(&(matrix_id, version))
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or_else(|| HistoryError::snapshot_not_found(matrix_id, version))
    }

    async fn version_metadata(&self, matrix_id: i64, version: u32) -> Result<VersionMetadata> {
        self.versions
            .read()
            .await
            .get(&(matrix_id, version))
            .map(|(metadata, _)| metadata.clone())
            .ok_or_else(|| HistoryError::snapshot_not_found(matrix_id, version))
    }

    async fn list_versions(&self, matrix_id: i64) -> Result<Vec<VersionMetadata>> {
        Ok(self
            .versions
            .read()
            .await
            .range((matrix_id, 0)..=(matrix_id, u32::MAX))
            .map(|(_, (metadata, _))| metadata.clone())
            .collect())
    }
}

/// Cached access to diffs, impact, exports and timelines of matrices.
pub struct VersionHistoryService {
    source: Arc<dyn SnapshotSource>,
    cache: HistoryCache,
    engine: DiffEngine,
    notifier: Arc<Notifier>,
}

impl VersionHistoryService {
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>, cache: HistoryCache, notifier: Arc<Notifier>) -> Self {
        Self {
            source,
            cache,
            engine: DiffEngine::new(),
            notifier,
        }
    }

    /// Build every collaborator from configuration.
    #[must_use]
    pub fn from_config(
        source: Arc<dyn SnapshotSource>,
        store: Arc<dyn KeyValueCache>,
        config: &AppConfig,
    ) -> Self {
        let cache = HistoryCache::with_compression(store, config.cache.clone(), config.compression);
        Self::new(source, cache, Arc::new(Notifier::new(config.notifier)))
    }

    #[must_use]
    pub const fn cache(&self) -> &HistoryCache {
        &self.cache
    }

    #[must_use]
    pub const fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// Normalized snapshot of a version.
    pub async fn snapshot(&self, matrix_id: i64, version: u32) -> Result<MatrixSnapshot> {
        if let CacheLookup::Hit(snapshot) = self.cache.get_snapshot(matrix_id, version).await {
            return Ok(snapshot);
        }
        let snapshot = self.source.load_snapshot(matrix_id, version).await?.normalized();
        self.cache.set_snapshot(matrix_id, version, &snapshot).await;
        Ok(snapshot)
    }

    /// Diff between two versions. A freshly computed diff is announced to
    /// subscribers of the matrix.
    pub async fn compare_versions(&self, matrix_id: i64, from: u32, to: u32) -> Result<MatrixDiff> {
        if let CacheLookup::Hit(diff) = self.cache.get_diff(matrix_id, from, to).await {
            return Ok(diff);
        }

        let (old, new, from_meta, to_meta) = futures::try_join!(
            self.snapshot(matrix_id, from),
            self.snapshot(matrix_id, to),
            self.source.version_metadata(matrix_id, from),
            self.source.version_metadata(matrix_id, to),
        )?;
        let diff = self
            .engine
            .generate_diff(&old, &new, DiffMetadata::between(&from_meta, &to_meta));
        self.cache.set_diff(matrix_id, from, to, &diff).await;

        let risk = generate_impact_analysis(&diff).risk_level;
        self.notifier
            .notify_diff_generated(matrix_id, from, to, diff.summary, Some(risk));
        Ok(diff)
    }

    pub async fn impact_analysis(&self, matrix_id: i64, from: u32, to: u32) -> Result<ImpactAnalysis> {
        if let CacheLookup::Hit(impact) = self.cache.get_impact(matrix_id, from, to).await {
            return Ok(impact);
        }
        let diff = self.compare_versions(matrix_id, from, to).await?;
        let impact = generate_impact_analysis(&diff);
        self.cache.set_impact(matrix_id, from, to, &impact).await;
        Ok(impact)
    }

    /// Rendered export of a diff.
    pub async fn export(&self, matrix_id: i64, from: u32, to: u32, format: ReportFormat) -> Result<String> {
        if let CacheLookup::Hit(content) = self.cache.get_export(matrix_id, from, to, format).await {
            return Ok(content);
        }
        let diff = self.compare_versions(matrix_id, from, to).await?;
        let content = create_reporter(format).generate(&diff)?;
        self.cache
            .set_export(matrix_id, from, to, format, &content)
            .await;
        Ok(content)
    }

    /// Per-version change counts, oldest first.
    pub async fn timeline(&self, matrix_id: i64) -> Result<Vec<VersionChangeStats>> {
        if let CacheLookup::Hit(timeline) = self.cache.get_timeline(matrix_id).await {
            return Ok(timeline);
        }
        let mut versions = Vec::new();
        for metadata in self.source.list_versions(matrix_id).await? {
            let snapshot = self.snapshot(matrix_id, metadata.version).await?;
            versions.push((metadata, snapshot));
        }
        let timeline = self.engine.generate_version_stats(&versions);
        self.cache.set_timeline(matrix_id, &timeline).await;
        Ok(timeline)
    }

    pub async fn history_stats(&self, matrix_id: i64) -> Result<HistoryStats> {
        if let CacheLookup::Hit(stats) = self.cache.get_stats(matrix_id).await {
            return Ok(stats);
        }
        let stats = HistoryStats::from_timeline(&self.timeline(matrix_id).await?);
        self.cache.set_stats(matrix_id, &stats).await;
        Ok(stats)
    }

    /// Call after a version is appended: drops what the new version makes
    /// stale and notifies subscribers.
    pub async fn record_new_version(&self, matrix_id: i64, version: u32) -> Result<Invalidation> {
        let metadata = self.source.version_metadata(matrix_id, version).await?;
        let invalidation = self.cache.invalidate_after_new_version(matrix_id).await;
        tracing::info!(
            matrix_id,
            version,
            removed = invalidation.removed,
            "Recorded new matrix version"
        );
        self.notifier
            .notify_version_created(matrix_id, version, metadata.created_by);
        self.notifier
            .notify_cache_invalidated(matrix_id, invalidation.removed);
        Ok(invalidation)
    }
}

impl std::fmt::Debug for VersionHistoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionHistoryService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::CacheConfig;
    use crate::model::{EntryField, MatrixEntry};

    fn rule(id: i64, action: &str) -> MatrixEntry {
        MatrixEntry::new(id)
            .with(EntryField::RuleName, format!("R{id}"))
            .with(EntryField::Action, action)
    }

    async fn service() -> (VersionHistoryService, Arc<MemorySnapshotSource>) {
        let source = Arc::new(MemorySnapshotSource::new());
        source
            .insert(1, VersionMetadata::new(1).created_by("ana"), MatrixSnapshot::new(vec![rule(1, "ALLOW")]))
            .await;
        source
            .insert(
                1,
                VersionMetadata::new(2).created_by("ben"),
                MatrixSnapshot::new(vec![rule(1, "DENY"), rule(2, "ALLOW")]),
            )
            .await;
        let cache = HistoryCache::new(Arc::new(MemoryCache::new()), CacheConfig::default());
        let service = VersionHistoryService::new(source.clone(), cache, Arc::new(Notifier::default()));
        (service, source)
    }

    #[tokio::test]
    async fn test_compare_versions_notifies_once() {
        let (service, _) = service().await;
        let mut sub = service.notifier().subscribe(1);

        let first = service.compare_versions(1, 1, 2).await.unwrap();
        let second = service.compare_versions(1, 1, 2).await.unwrap();
        assert_eq!(first, second);
        assert_eq!((first.summary.added, first.summary.modified), (1, 1));

        assert_eq!(sub.try_recv().unwrap().event.kind(), "diff_generated");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_missing_version_is_error() {
        let (service, _) = service().await;
        let err = service.compare_versions(1, 1, 9).await.unwrap_err();
        assert!(matches!(
            err,
            HistoryError::Snapshot {
                source: crate::error::SnapshotErrorKind::NotFound { version: 9, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_record_new_version_invalidates_timeline() {
        let (service, source) = service().await;
        assert_eq!(service.timeline(1).await.unwrap().len(), 2);

        source
            .insert(1, VersionMetadata::new(3), MatrixSnapshot::new(vec![rule(2, "ALLOW")]))
            .await;
        let invalidation = service.record_new_version(1, 3).await.unwrap();
        assert!(invalidation.removed >= 1);

        let timeline = service.timeline(1).await.unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[2].removed, 1);

        let stats = service.history_stats(1).await.unwrap();
        assert_eq!(stats.total_versions, 3);
    }

    #[tokio::test]
    async fn test_export_and_impact() {
        let (service, _) = service().await;
        let impact = service.impact_analysis(1, 1, 2).await.unwrap();
        assert_eq!(impact.risk_level, crate::diff::RiskLevel::Critical);

        let csv = service.export(1, 1, 2, ReportFormat::Csv).await.unwrap();
        assert!(csv.starts_with("\"Type\",\"ID\""));
        assert_eq!(service.export(1, 1, 2, ReportFormat::Csv).await.unwrap(), csv);
    }
}
