//! Search engine behaviour across indexes, filters and the shared cache.

use matrix_history::{
    cache::MemoryCache,
    config::{CacheConfig, SearchConfig},
    model::{EntryField, MatrixEntry},
    search::{SearchEngine, SearchFilters, SearchOptions},
    HistoryError,
};
use std::sync::Arc;

fn entries() -> Vec<MatrixEntry> {
    vec![
        MatrixEntry::new(1)
            .with(EntryField::RuleName, "Backup server access")
            .with(EntryField::SrcName, "backup-01")
            .with(EntryField::Action, "ALLOW"),
        MatrixEntry::new(2)
            .with(EntryField::RuleName, "Web frontend")
            .with(EntryField::Comment, "backup window excluded")
            .with(EntryField::Action, "ALLOW"),
        MatrixEntry::new(3)
            .with(EntryField::RuleName, "Database replication")
            .with(EntryField::Device, "fw-core")
            .with(EntryField::Action, "DENY"),
        MatrixEntry::new(4).with(EntryField::RuleName, "Backup Database"),
    ]
}

async fn engine() -> SearchEngine {
    let engine = SearchEngine::new(SearchConfig::default());
    engine.build_index(1, &entries(), None).await;
    engine
}

#[tokio::test]
async fn test_results_are_deterministic_and_ranked() {
    let engine = engine().await;
    let options = SearchOptions::for_matrix(1);

    let first = engine.search("backup", &options).await.unwrap();
    let ids: Vec<i64> = first.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 3);
    assert!(first.windows(2).all(|w| w[0].score >= w[1].score));

    for _ in 0..5 {
        let again: Vec<i64> = engine
            .search("backup", &options)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(again, ids);
    }
}

#[tokio::test]
async fn test_terms_are_anded() {
    let engine = engine().await;
    let results = engine
        .search("backup database", &SearchOptions::for_matrix(1))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 4);
}

#[tokio::test]
async fn test_empty_index_and_unknown_matrix() {
    let engine = SearchEngine::new(SearchConfig::default());
    engine.build_index(9, &[], None).await;

    assert!(engine
        .search("anything", &SearchOptions::for_matrix(9))
        .await
        .unwrap()
        .is_empty());
    assert!(engine
        .search("anything", &SearchOptions::for_matrix(10))
        .await
        .unwrap()
        .is_empty());
    assert!(engine.autocomplete(10, "an", None).await.is_empty());
    let fuzzy = engine.fuzzy_search(10, "anything", None).await.unwrap();
    assert!(fuzzy.results.is_empty());
    assert!(fuzzy.suggestions.is_empty());
}

#[tokio::test]
async fn test_malformed_queries() {
    let engine = engine().await;
    let options = SearchOptions::for_matrix(1);
    assert!(matches!(
        engine.search("   ", &options).await,
        Err(HistoryError::Search { .. })
    ));
    let overlong = "x".repeat(matrix_history::search::MAX_QUERY_CHARS + 1);
    assert!(engine.search(&overlong, &options).await.is_err());
}

#[tokio::test]
async fn test_required_fields_filter() {
    let engine = engine().await;
    let options = SearchOptions::default().filters(SearchFilters {
        matrix_id: Some(1),
        required_fields: vec![EntryField::Action],
        ..SearchFilters::default()
    });
    let ids: Vec<i64> = engine
        .search("backup", &options)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert!(!ids.contains(&4));
    assert!(ids.contains(&1));
}

#[tokio::test]
async fn test_version_filter_selects_index() {
    let engine = SearchEngine::new(SearchConfig::default());
    engine
        .build_index(1, &[MatrixEntry::new(1).with(EntryField::RuleName, "legacy proxy")], Some(1))
        .await;
    engine
        .build_index(1, &[MatrixEntry::new(1).with(EntryField::RuleName, "modern proxy")], Some(2))
        .await;

    let all = engine.search("proxy", &SearchOptions::for_matrix(1)).await.unwrap();
    assert_eq!(all.len(), 2);

    let options = SearchOptions::default().filters(SearchFilters {
        matrix_id: Some(1),
        version: Some(2),
        ..SearchFilters::default()
    });
    let v2 = engine.search("proxy", &options).await.unwrap();
    assert_eq!(v2.len(), 1);
    assert_eq!(v2[0].document.version, Some(2));

    // Autocomplete falls back to the highest version.
    let completions = engine.autocomplete(1, "mod", None).await;
    assert_eq!(completions, vec!["modern".to_string(), "modern proxy".to_string()]);
    assert!(engine.autocomplete(1, "leg", None).await.is_empty());
}

#[tokio::test]
async fn test_fuzzy_search_tolerates_typos() {
    let engine = engine().await;
    let fuzzy = engine.fuzzy_search(1, "backpu", None).await.unwrap();
    assert!(fuzzy.results.iter().any(|r| r.id == 1));
    assert!(fuzzy.suggestions.contains(&"backup".to_string()));
    assert!(!fuzzy.suggestions.contains(&"backpu".to_string()));
}

#[tokio::test]
async fn test_autocomplete_contract() {
    let engine = engine().await;
    let suggestions = engine.autocomplete(1, "BA", Some(3)).await;
    assert!(!suggestions.is_empty());
    assert!(suggestions.len() <= 3);
    assert!(suggestions.iter().all(|s| s.starts_with("ba")));
    assert_eq!(suggestions[0], "backup");

    assert!(engine.autocomplete(1, "b", None).await.is_empty());
}

#[tokio::test]
async fn test_remove_matrix_drops_indexes() {
    let engine = engine().await;
    assert_eq!(engine.remove_matrix(1).await, 1);
    assert!(engine
        .search("backup", &SearchOptions::for_matrix(1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_index_shared_through_cache() {
    let cache = Arc::new(MemoryCache::new());
    let writer = SearchEngine::new(SearchConfig::default()).with_cache(cache.clone(), &CacheConfig::default());
    writer.build_index(5, &entries(), None).await;

    let reader = SearchEngine::new(SearchConfig::default()).with_cache(cache.clone(), &CacheConfig::default());
    let results = reader
        .search("replication", &SearchOptions::for_matrix(5))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 3);
    assert_eq!(reader.store().len(), 1);
}
