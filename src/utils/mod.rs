//! Shared utilities.

mod hash;

pub use hash::{content_hash, sha256_hex};
