//! Inverted search index over matrix entries.
//!
//! One [`SearchIndex`] is built per `(matrix, version?)` key and held in an
//! injected [`IndexStore`]. Building again for a key replaces the index
//! whole; there are no incremental updates.
//!
//! ```
//! # tokio_test_block(async {
//! use matrix_history::config::SearchConfig;
//! use matrix_history::model::{EntryField, MatrixEntry};
//! use matrix_history::search::{SearchEngine, SearchOptions};
//!
//! let engine = SearchEngine::new(SearchConfig::default());
//! let entries = vec![MatrixEntry::new(1).with(EntryField::RuleName, "Backup server")];
//! engine.build_index(1, &entries, None).await;
//!
//! let hits = engine.search("backup", &SearchOptions::for_matrix(1)).await.unwrap();
//! assert_eq!(hits[0].id, 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod engine;
mod index;
mod store;
mod tokenize;

pub use engine::{FuzzySearchResults, SearchEngine, SearchFilters, SearchOptions, SearchResult, MAX_QUERY_CHARS};
pub use index::{field_weight, IndexMetadata, IndexedDocument, SearchIndex, INDEXED_FIELDS};
pub use store::{IndexKey, IndexStore};
pub use tokenize::{index_terms, query_terms};
