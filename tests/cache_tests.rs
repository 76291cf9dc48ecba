//! Cache behaviour against an unreliable store.
//!
//! The store is an optimization: every failure must degrade to a miss and
//! the service must keep answering from the snapshot source.

use async_trait::async_trait;
use matrix_history::{
    cache::{CacheLookup, CacheWrite, HistoryCache, KeyValueCache, MemoryCache},
    config::{AppConfig, CacheConfig},
    error::{CacheErrorKind, HistoryError, Result},
    model::{EntryField, MatrixEntry, MatrixSnapshot, VersionMetadata},
    service::{MemorySnapshotSource, VersionHistoryService},
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store double that fails every call while `down` is set.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryCache,
    down: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyStore {
    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(HistoryError::cache(
                "flaky store",
                CacheErrorKind::Unavailable("connection refused".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueCache for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check()?;
        self.inner.del(key).await
    }

    async fn del_pattern(&self, pattern: &str) -> Result<usize> {
        self.check()?;
        self.inner.del_pattern(pattern).await
    }

    async fn info(&self) -> Result<String> {
        self.check()?;
        self.inner.info().await
    }
}

fn snapshot() -> MatrixSnapshot {
    MatrixSnapshot::new(vec![
        MatrixEntry::new(1)
            .with(EntryField::RuleName, "dns")
            .with(EntryField::Action, "ALLOW"),
        MatrixEntry::new(2)
            .with(EntryField::RuleName, "ntp")
            .with(EntryField::Action, "ALLOW"),
    ])
}

#[tokio::test]
async fn test_unavailable_store_degrades_reads_and_writes() {
    let store = Arc::new(FlakyStore::default());
    store.set_down(true);
    let cache = HistoryCache::new(store.clone(), CacheConfig::default());

    let write = cache.set_snapshot(7, 1, &snapshot()).await;
    assert!(matches!(write, CacheWrite::Degraded(_)));
    assert!(!write.is_stored());

    let read = cache.get_snapshot(7, 1).await;
    assert!(read.is_degraded());
    assert!(read.into_option().is_none());

    let invalidation = cache.invalidate_matrix_history(7).await;
    assert_eq!(invalidation.removed, 0);
    assert!(!invalidation.degraded.is_empty());

    assert!(cache.info().await.is_degraded());
}

#[tokio::test]
async fn test_store_recovery_resumes_caching() {
    let store = Arc::new(FlakyStore::default());
    let cache = HistoryCache::new(store.clone(), CacheConfig::default());

    store.set_down(true);
    let _ = cache.set_snapshot(7, 1, &snapshot()).await;
    store.set_down(false);

    assert!(matches!(cache.get_snapshot(7, 1).await, CacheLookup::Miss));
    assert!(cache.set_snapshot(7, 1, &snapshot()).await.is_stored());
    assert!(cache.get_snapshot(7, 1).await.is_hit());
}

#[tokio::test]
async fn test_undecodable_entry_is_dropped() {
    let store = Arc::new(MemoryCache::new());
    let cache = HistoryCache::new(store.clone(), CacheConfig::default());
    let key = cache.snapshot_key(7, 1);
    store
        .set(&key, "definitely not a snapshot".to_string(), None)
        .await
        .unwrap();

    assert!(cache.get_snapshot(7, 1).await.is_degraded());
    assert!(store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_service_answers_while_store_is_down() {
    let source = Arc::new(MemorySnapshotSource::new());
    source
        .insert(7, VersionMetadata::new(1), snapshot())
        .await;
    let mut next = snapshot();
    next.entries[1].action = Some("DENY".to_string());
    source.insert(7, VersionMetadata::new(2), next).await;

    let store = Arc::new(FlakyStore::default());
    store.set_down(true);
    let service = VersionHistoryService::from_config(source, store.clone(), &AppConfig::default());

    let diff = service.compare_versions(7, 1, 2).await.unwrap();
    assert_eq!(diff.summary.modified, 1);
    let stats = service.history_stats(7).await.unwrap();
    assert_eq!(stats.total_versions, 2);

    let invalidation = service.record_new_version(7, 2).await.unwrap();
    assert_eq!(invalidation.removed, 0);
    assert!(store.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let store = MemoryCache::new();
    store
        .set("matrix:diff:1:1:2", "{}".to_string(), Some(Duration::from_millis(20)))
        .await
        .unwrap();
    store
        .set("matrix:diff:1:2:3", "{}".to_string(), None)
        .await
        .unwrap();
    assert_eq!(store.len().await, 2);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(store.get("matrix:diff:1:1:2").await.unwrap().is_none());
    assert_eq!(store.keys().await, vec!["matrix:diff:1:2:3".to_string()]);
}

#[tokio::test]
async fn test_pattern_delete_is_scoped_to_matrix() {
    let store = Arc::new(MemoryCache::new());
    for key in ["matrix:diff:1:1:2", "matrix:diff:1:2:3", "matrix:diff:12:1:2"] {
        store.set(key, "{}".to_string(), None).await.unwrap();
    }
    assert_eq!(store.del_pattern("matrix:diff:1:*").await.unwrap(), 2);
    assert_eq!(store.keys().await, vec!["matrix:diff:12:1:2".to_string()]);
}
