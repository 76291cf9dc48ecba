//! Query side of the search index: scored search, fuzzy search and
//! autocomplete.

use super::index::{field_weight, IndexMetadata, IndexedDocument, SearchIndex};
use super::store::{IndexKey, IndexStore};
use super::tokenize::{query_terms, words, MIN_TOKEN_CHARS};
use crate::cache::KeyValueCache;
use crate::compression::{pack_json, unpack_json};
use crate::config::{CacheConfig, SearchConfig};
use crate::error::{HistoryError, Result};
use crate::model::{EntryField, MatrixEntry};
use crate::reports::escape::escape_html;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use strsim::levenshtein;

/// Longest accepted query
pub const MAX_QUERY_CHARS: usize = 512;

const EXACT_QUERY_BONUS: f64 = 10.0;
const STALE_PENALTY: f64 = 0.9;
const FUZZY_DISCOUNT: f64 = 0.8;
const SNIPPET_CHARS: usize = 120;
const SNIPPET_LEAD: usize = 40;
const PERSISTED_LEVEL: u32 = 6;

// ============================================================================
// Options and results
// ============================================================================

/// Document filters applied after term matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub matrix_id: Option<i64>,
    pub version: Option<u32>,
    /// Every listed field must be populated
    pub required_fields: Vec<EntryField>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl SearchFilters {
    fn validate(&self) -> Result<()> {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) if from > to => Err(HistoryError::malformed_query(format!(
                "date range starts after it ends ({from} > {to})"
            ))),
            _ => Ok(()),
        }
    }

    fn accepts(&self, doc: &IndexedDocument) -> bool {
        self.matrix_id.map_or(true, |id| doc.matrix_id == id)
            && (self.version.is_none() || doc.version == self.version)
            && self.required_fields.iter().all(|f| doc.fields.contains_key(f))
            && self.date_from.map_or(true, |from| doc.last_modified >= from)
            && self.date_to.map_or(true, |to| doc.last_modified <= to)
    }
}

/// Options for [`SearchEngine::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    /// Disable the substring fallback for terms with no exact match
    pub whole_words: bool,
    /// Always widen terms to every index term containing them
    pub fuzzy: bool,
    pub filters: SearchFilters,
    /// Overrides the configured result cap
    pub max_results: Option<usize>,
}

impl SearchOptions {
    /// Options restricted to one matrix.
    #[must_use]
    pub fn for_matrix(matrix_id: i64) -> Self {
        Self {
            filters: SearchFilters {
                matrix_id: Some(matrix_id),
                ..SearchFilters::default()
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn case_sensitive(mut self, on: bool) -> Self {
        self.case_sensitive = on;
        self
    }

    #[must_use]
    pub const fn whole_words(mut self, on: bool) -> Self {
        self.whole_words = on;
        self
    }

    #[must_use]
    pub const fn fuzzy(mut self, on: bool) -> Self {
        self.fuzzy = on;
        self
    }

    #[must_use]
    pub const fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub score: f64,
    /// HTML-escaped snippets with matches wrapped in `<mark>`
    pub highlights: Vec<String>,
    pub document: IndexedDocument,
    pub matched_terms: Vec<String>,
}

/// Hits and spelling suggestions from [`SearchEngine::fuzzy_search`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzySearchResults {
    pub results: Vec<SearchResult>,
    pub suggestions: Vec<String>,
}

// ============================================================================
// Engine
// ============================================================================

/// Search over per-matrix indexes held in an [`IndexStore`].
///
/// With a [`KeyValueCache`] attached, built indexes are also persisted and
/// an index missing from the store is loaded from the cache on first use.
/// Persistence is best-effort: failures are logged and never returned.
pub struct SearchEngine {
    store: Arc<IndexStore>,
    config: SearchConfig,
    persistence: Option<Persistence>,
}

impl SearchEngine {
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        Self::with_store(Arc::new(IndexStore::new()), config)
    }

    #[must_use]
    pub const fn with_store(store: Arc<IndexStore>, config: SearchConfig) -> Self {
        Self {
            store,
            config,
            persistence: None,
        }
    }

    /// Persist indexes through a cache, under `{key_prefix}:search:`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn KeyValueCache>, cache_config: &CacheConfig) -> Self {
        self.persistence = Some(Persistence {
            cache,
            key_prefix: cache_config.key_prefix.clone(),
            ttl: cache_config.snapshot_ttl(),
        });
        self
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Build and install the index for `(matrix_id, version)`, replacing any
    /// previous one.
    pub async fn build_index(
        &self,
        matrix_id: i64,
        entries: &[MatrixEntry],
        version: Option<u32>,
    ) -> IndexMetadata {
        let key = IndexKey::new(matrix_id, version);
        let index = Arc::new(SearchIndex::build(matrix_id, entries, version));
        let metadata = index.metadata.clone();
        self.store.insert_shared(key, Arc::clone(&index));

        tracing::debug!(
            key = %key,
            documents = metadata.total_documents,
            terms = metadata.total_terms,
            bytes = metadata.index_size,
            "Built search index"
        );

        if let Some(persistence) = &self.persistence {
            persistence.save(key, &index).await;
        }
        metadata
    }

    /// Drop every index of a matrix, in process and in the cache.
    pub async fn remove_matrix(&self, matrix_id: i64) -> usize {
        let removed = self.store.remove_matrix(matrix_id);
        if let Some(persistence) = &self.persistence {
            persistence.forget(matrix_id).await;
        }
        removed
    }

    /// Scored search.
    ///
    /// Terms are AND-ed. A term with no exact index match falls back to
    /// every index term containing it, unless `whole_words` is set.
    ///
    /// # Errors
    ///
    /// Empty or overlong queries and inverted date ranges are malformed.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let query = validate_query(query)?;
        options.filters.validate()?;

        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let plan = QueryPlan {
            full: query.to_lowercase(),
            case_words: if options.case_sensitive { words(query) } else { Vec::new() },
            terms,
            options,
            stale_before: self.stale_before(),
            discount: 1.0,
        };

        let indexes = self
            .indexes_for(options.filters.matrix_id, options.filters.version)
            .await;
        let mut results: Vec<SearchResult> = indexes.iter().flat_map(|index| plan.run(index)).collect();
        rank(&mut results, options.max_results.unwrap_or(self.config.max_results));

        tracing::debug!(
            query,
            indexes = indexes.len(),
            results = results.len(),
            "Search completed"
        );
        Ok(results)
    }

    /// Search with every index term within `max_distance` edits of `term`,
    /// or containing it, used as a seed. Seeded scores are discounted and
    /// each document keeps its best score.
    ///
    /// # Errors
    ///
    /// Empty or overlong terms are malformed.
    pub async fn fuzzy_search(
        &self,
        matrix_id: i64,
        term: &str,
        max_distance: Option<usize>,
    ) -> Result<FuzzySearchResults> {
        let term = validate_query(term)?.to_lowercase();
        let max_distance = max_distance.unwrap_or(self.config.fuzzy_max_distance);
        let Some(index) = self.latest_index(matrix_id).await else {
            return Ok(FuzzySearchResults::default());
        };

        let mut seeds: Vec<(usize, &String)> = index
            .terms
            .keys()
            .filter(|candidate| !candidate.contains(' '))
            .filter_map(|candidate| {
                let distance = levenshtein(&term, candidate);
                let related = distance <= max_distance
                    || candidate.contains(term.as_str())
                    || term.contains(candidate.as_str());
                related.then_some((distance, candidate))
            })
            .collect();
        seeds.sort();

        let options = SearchOptions::for_matrix(matrix_id);
        let stale_before = self.stale_before();
        let mut best: HashMap<i64, SearchResult> = HashMap::new();

        for (_, seed) in &seeds {
            let plan = QueryPlan {
                full: (*seed).clone(),
                terms: vec![(*seed).clone()],
                case_words: Vec::new(),
                options: &options,
                stale_before,
                discount: FUZZY_DISCOUNT,
            };
            for result in plan.run(&index) {
                match best.get(&result.id) {
                    Some(existing) if existing.score >= result.score => {}
                    _ => {
                        best.insert(result.id, result);
                    }
                }
            }
        }

        let mut results: Vec<SearchResult> = best.into_values().collect();
        rank(&mut results, self.config.max_results);

        let suggestions: Vec<String> = seeds
            .iter()
            .filter(|(_, seed)| **seed != term)
            .take(self.config.suggestion_limit)
            .map(|(_, seed)| (*seed).clone())
            .collect();

        tracing::debug!(
            matrix_id,
            term = %term,
            seeds = seeds.len(),
            results = results.len(),
            "Fuzzy search completed"
        );
        Ok(FuzzySearchResults { results, suggestions })
    }

    /// Index terms starting with `prefix`, most frequent first.
    ///
    /// Prefixes shorter than two characters return nothing.
    pub async fn autocomplete(&self, matrix_id: i64, prefix: &str, limit: Option<usize>) -> Vec<String> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.chars().count() < MIN_TOKEN_CHARS {
            return Vec::new();
        }
        let Some(index) = self.latest_index(matrix_id).await else {
            return Vec::new();
        };

        let mut matches: Vec<(&String, usize)> = index
            .terms
            .iter()
            .filter(|(term, _)| term.starts_with(prefix.as_str()))
            .map(|(term, ids)| (term, ids.len()))
            .collect();
        matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        matches
            .into_iter()
            .take(limit.unwrap_or(self.config.autocomplete_limit))
            .map(|(term, _)| term.clone())
            .collect()
    }

    // ========================================================================
    // Index resolution
    // ========================================================================

    async fn indexes_for(&self, matrix_id: Option<i64>, version: Option<u32>) -> Vec<Arc<SearchIndex>> {
        let found: Vec<Arc<SearchIndex>> = self
            .store
            .matching(matrix_id, version)
            .into_iter()
            .map(|(_, index)| index)
            .collect();
        if !found.is_empty() {
            return found;
        }
        match matrix_id {
            Some(matrix_id) => self
                .load_persisted(IndexKey::new(matrix_id, version))
                .await
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }

    /// The unversioned index of a matrix, else its highest version.
    async fn latest_index(&self, matrix_id: i64) -> Option<Arc<SearchIndex>> {
        let unversioned = IndexKey::new(matrix_id, None);
        if let Some(index) = self.store.get(unversioned) {
            return Some(index);
        }
        if let Some((_, index)) = self.store.matching(Some(matrix_id), None).pop() {
            return Some(index);
        }
        self.load_persisted(unversioned).await
    }

    async fn load_persisted(&self, key: IndexKey) -> Option<Arc<SearchIndex>> {
        let index = Arc::new(self.persistence.as_ref()?.load(key).await?);
        self.store.insert_shared(key, Arc::clone(&index));
        tracing::debug!(key = %key, "Loaded search index from cache");
        Some(index)
    }

    fn stale_before(&self) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::days(self.config.stale_after_days)
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("indexes", &self.store.len())
            .field("config", &self.config)
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

// ============================================================================
// Persistence
// ============================================================================

struct Persistence {
    cache: Arc<dyn KeyValueCache>,
    key_prefix: String,
    ttl: Duration,
}

impl Persistence {
    fn key(&self, key: IndexKey) -> String {
        format!("{}:search:{key}", self.key_prefix)
    }

    async fn save(&self, key: IndexKey, index: &SearchIndex) {
        let cache_key = self.key(key);
        let stored = match pack_json(index, PERSISTED_LEVEL) {
            Ok(text) => self.cache.set(&cache_key, text, Some(self.ttl)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            tracing::warn!(key = %cache_key, error = %e, "Failed to persist search index");
        }
    }

    async fn load(&self, key: IndexKey) -> Option<SearchIndex> {
        let cache_key = self.key(key);
        match self.cache.get(&cache_key).await {
            Ok(Some(text)) => match unpack_json(&text) {
                Ok(index) => Some(index),
                Err(e) => {
                    tracing::warn!(key = %cache_key, error = %e, "Discarding undecodable search index");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "Search index cache read failed");
                None
            }
        }
    }

    async fn forget(&self, matrix_id: i64) {
        let pattern = format!("{}:search:{matrix_id}:*", self.key_prefix);
        if let Err(e) = self.cache.del_pattern(&pattern).await {
            tracing::warn!(pattern = %pattern, error = %e, "Failed to drop persisted search indexes");
        }
    }
}

// ============================================================================
// Query execution
// ============================================================================

struct QueryPlan<'a> {
    /// Lowercased full query, for the exact-match bonus
    full: String,
    terms: Vec<String>,
    /// Case-preserved words; empty unless matching is case sensitive
    case_words: Vec<String>,
    options: &'a SearchOptions,
    stale_before: DateTime<Utc>,
    discount: f64,
}

impl QueryPlan<'_> {
    fn run(&self, index: &SearchIndex) -> Vec<SearchResult> {
        self.candidates(index)
            .into_iter()
            .filter_map(|id| index.documents.get(&id))
            .filter(|doc| self.options.filters.accepts(doc))
            .filter(|doc| self.matches_case_and_words(doc))
            .map(|doc| self.result(doc))
            .collect()
    }

    fn candidates(&self, index: &SearchIndex) -> BTreeSet<i64> {
        let mut matched: Option<BTreeSet<i64>> = None;
        for term in &self.terms {
            let mut ids = index.postings(term).cloned().unwrap_or_default();
            if self.options.fuzzy || (ids.is_empty() && !self.options.whole_words) {
                ids.extend(index.substring_postings(term));
            }
            let next = match matched {
                None => ids,
                Some(previous) => previous.intersection(&ids).copied().collect(),
            };
            let exhausted = next.is_empty();
            matched = Some(next);
            if exhausted {
                break;
            }
        }
        matched.unwrap_or_default()
    }

    fn matches_case_and_words(&self, doc: &IndexedDocument) -> bool {
        if !self.case_words.is_empty() {
            let original = doc.original_text();
            if !self.case_words.iter().all(|w| original.contains(w.as_str())) {
                return false;
            }
        }
        if self.options.whole_words {
            let doc_words = query_terms(&doc.searchable_text);
            return self.terms.iter().all(|t| doc_words.contains(t));
        }
        true
    }

    fn result(&self, doc: &IndexedDocument) -> SearchResult {
        let occurrences: usize = self
            .terms
            .iter()
            .map(|t| doc.searchable_text.matches(t.as_str()).count())
            .sum();
        let field_bonus: f64 = doc
            .fields
            .iter()
            .map(|(field, value)| {
                let value = value.to_lowercase();
                let hits: usize = self.terms.iter().map(|t| value.matches(t.as_str()).count()).sum();
                field_weight(*field) * hits as f64
            })
            .sum();

        let mut score = doc.weight + 2.0 * occurrences as f64 + field_bonus;
        if doc.searchable_text.contains(self.full.as_str()) {
            score += EXACT_QUERY_BONUS;
        }
        if doc.last_modified < self.stale_before {
            score *= STALE_PENALTY;
        }

        SearchResult {
            id: doc.id,
            score: score * self.discount,
            highlights: doc
                .fields
                .values()
                .filter_map(|value| highlight(value, &self.terms))
                .collect(),
            document: doc.clone(),
            matched_terms: self
                .terms
                .iter()
                .filter(|t| doc.searchable_text.contains(t.as_str()))
                .cloned()
                .collect(),
        }
    }
}

fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(HistoryError::malformed_query("query is empty"));
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(HistoryError::malformed_query(format!(
            "query exceeds {MAX_QUERY_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

fn rank(results: &mut Vec<SearchResult>, limit: usize) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.document.matrix_id.cmp(&b.document.matrix_id))
            .then_with(|| a.document.version.cmp(&b.document.version))
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(limit);
}

/// Snippet of at most 120 source characters starting a little before the
/// first match, escaped, with every match marked.
fn highlight(value: &str, terms: &[String]) -> Option<String> {
    let original: Vec<char> = value.chars().collect();
    let folded: Vec<char> = original
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();
    let needles: Vec<Vec<char>> = terms
        .iter()
        .map(|t| t.chars().collect::<Vec<_>>())
        .filter(|t| !t.is_empty())
        .collect();
    let match_len = |pos: usize| {
        needles
            .iter()
            .filter(|needle| folded[pos..].starts_with(needle.as_slice()))
            .map(Vec::len)
            .max()
    };

    let first = (0..folded.len()).find(|&pos| match_len(pos).is_some())?;
    let start = first.saturating_sub(SNIPPET_LEAD);
    let end = (start + SNIPPET_CHARS).min(original.len());

    let mut snippet = String::new();
    let mut plain = String::new();
    let mut pos = start;
    while pos < end {
        if let Some(len) = match_len(pos) {
            let stop = (pos + len).min(end);
            snippet.push_str(&escape_html(&plain));
            plain.clear();
            let marked: String = original[pos..stop].iter().collect();
            snippet.push_str("<mark>");
            snippet.push_str(&escape_html(&marked));
            snippet.push_str("</mark>");
            pos = stop;
        } else {
            plain.push(original[pos]);
            pos += 1;
        }
    }
    snippet.push_str(&escape_html(&plain));
    Some(snippet)
}
