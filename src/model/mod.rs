//! Flow-matrix data model.
//!
//! Snapshots are immutable lists of [`MatrixEntry`] captured at a version.
//! Everything else in the crate (diffs, impact analyses, compressed
//! snapshots, search indexes) is derived from these shapes and can be
//! recomputed at any time.
//!
//! Field access is typed: [`EntryField`] enumerates every comparable
//! attribute, so diffing and indexing iterate a fixed list instead of
//! looking properties up by name.

mod entry;
mod snapshot;

pub use entry::*;
pub use snapshot::*;
