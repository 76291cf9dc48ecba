//! Owned store of built indexes.

use super::index::SearchIndex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Index key: one index per matrix, optionally per version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub matrix_id: i64,
    pub version: Option<u32>,
}

impl IndexKey {
    #[must_use]
    pub const fn new(matrix_id: i64, version: Option<u32>) -> Self {
        Self { matrix_id, version }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}:{version}", self.matrix_id),
            None => write!(f, "{}:latest", self.matrix_id),
        }
    }
}

/// Map of `IndexKey` to immutable indexes.
///
/// Indexes are shared as `Arc` and replaced whole, so a reader holds either
/// the previous or the new index, never a partial one.
#[derive(Debug, Default)]
pub struct IndexStore {
    indexes: RwLock<HashMap<IndexKey, Arc<SearchIndex>>>,
}

impl IndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current index for a key.
    pub fn get(&self, key: IndexKey) -> Option<Arc<SearchIndex>> {
        self.indexes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Indexes of one matrix, or of every matrix, ordered by key.
    pub fn matching(&self, matrix_id: Option<i64>, version: Option<u32>) -> Vec<(IndexKey, Arc<SearchIndex>)> {
        let indexes = self
            .indexes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut found: Vec<_> = indexes
            .iter()
            .filter(|(key, _)| matrix_id.map_or(true, |id| key.matrix_id == id))
            .filter(|(key, _)| version.is_none() || key.version == version)
            .map(|(key, index)| (*key, Arc::clone(index)))
            .collect();
        found.sort_by_key(|(key, _)| (key.matrix_id, key.version));
        found
    }

    /// Install an index, returning the one it replaced.
    pub fn replace(&self, key: IndexKey, index: SearchIndex) -> Option<Arc<SearchIndex>> {
        self.insert_shared(key, Arc::new(index))
    }

    pub(crate) fn insert_shared(&self, key: IndexKey, index: Arc<SearchIndex>) -> Option<Arc<SearchIndex>> {
        self.indexes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, index)
    }

    /// Drop every index of a matrix, returning how many were removed.
    pub fn remove_matrix(&self, matrix_id: i64) -> usize {
        let mut indexes = self
            .indexes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = indexes.len();
        indexes.retain(|key, _| key.matrix_id != matrix_id);
        before - indexes.len()
    }

    pub fn clear(&self) {
        self.indexes
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.indexes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryField, MatrixEntry};

    fn index_of(name: &str) -> SearchIndex {
        SearchIndex::build(1, &[MatrixEntry::new(1).with(EntryField::RuleName, name)], None)
    }

    #[test]
    fn test_replace_swaps_whole_index() {
        let store = IndexStore::new();
        let key = IndexKey::new(1, None);
        assert!(store.replace(key, index_of("first")).is_none());

        let held = store.get(key).unwrap();
        let previous = store.replace(key, index_of("second")).unwrap();

        assert!(Arc::ptr_eq(&held, &previous));
        assert!(held.postings("first").is_some());
        assert!(store.get(key).unwrap().postings("second").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_matrix() {
        let store = IndexStore::new();
        store.replace(IndexKey::new(1, None), index_of("a1"));
        store.replace(IndexKey::new(1, Some(2)), index_of("a2"));
        store.replace(IndexKey::new(2, None), index_of("b1"));
        assert_eq!(store.remove_matrix(1), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(IndexKey::new(4, Some(2)).to_string(), "4:2");
        assert_eq!(IndexKey::new(4, None).to_string(), "4:latest");
    }
}
