//! History caching over an external key/value store.
//!
//! Caching is an optimization only: a failing store degrades every read to
//! a miss and every write to a logged no-op.

mod compact;
mod history;
mod store;

pub use history::{ArtifactKind, CacheLookup, CacheWrite, HistoryCache, Invalidation};
pub use store::{KeyValueCache, MemoryCache};
