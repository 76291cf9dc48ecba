//! Unified error types for matrix-history.
//!
//! Pure computations only fail on genuinely invalid input (an unknown export
//! format, an empty query) or on integrity violations. Cache and index-store
//! failures are not errors for callers: they surface as degraded lookups in
//! [`crate::cache`] and are logged instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for matrix-history operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HistoryError {
    /// Errors while exporting a diff
    #[error("Export failed: {context}")]
    Report {
        context: String,
        #[source]
        source: ReportErrorKind,
    },

    /// Checksum or payload corruption detected on decompression
    #[error("Integrity check failed: {context}")]
    Integrity {
        context: String,
        #[source]
        source: IntegrityErrorKind,
    },

    /// Errors talking to the key/value cache
    #[error("Cache operation failed: {context}")]
    Cache {
        context: String,
        #[source]
        source: CacheErrorKind,
    },

    /// Errors in search input
    #[error("Search failed: {context}")]
    Search {
        context: String,
        #[source]
        source: SearchErrorKind,
    },

    /// Errors loading snapshots from the snapshot source
    #[error("Snapshot unavailable: {context}")]
    Snapshot {
        context: String,
        #[source]
        source: SnapshotErrorKind,
    },

    /// IO errors with context
    #[error("IO error at {path:?}: {message}")]
    Io {
        path: Option<PathBuf>,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Specific report error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReportErrorKind {
    #[error("Unsupported export format: {0} (supported: json, csv, markdown)")]
    UnsupportedFormat(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Specific integrity error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IntegrityErrorKind {
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("Unknown dictionary code: {0}")]
    UnknownCode(String),
}

/// Specific cache error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CacheErrorKind {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cached payload could not be decoded: {0}")]
    Decode(String),
}

/// Specific search error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SearchErrorKind {
    #[error("Malformed query: {0}")]
    MalformedQuery(String),
}

/// Specific snapshot error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SnapshotErrorKind {
    #[error("No snapshot for matrix {matrix_id} version {version}")]
    NotFound { matrix_id: i64, version: u32 },

    #[error("Invalid snapshot: {0}")]
    Invalid(String),
}

// ============================================================================
// Result type alias
// ============================================================================

/// Convenient Result type for matrix-history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

// ============================================================================
// Error construction helpers
// ============================================================================

impl HistoryError {
    /// Create a report error with context
    pub fn report(context: impl Into<String>, source: ReportErrorKind) -> Self {
        Self::Report {
            context: context.into(),
            source,
        }
    }

    /// Create a report error for an unknown export format
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        let format = format.into();
        Self::report(
            format!("format '{format}'"),
            ReportErrorKind::UnsupportedFormat(format),
        )
    }

    /// Create an integrity error with context
    pub fn integrity(context: impl Into<String>, source: IntegrityErrorKind) -> Self {
        Self::Integrity {
            context: context.into(),
            source,
        }
    }

    /// Create an integrity error for a checksum mismatch
    pub fn checksum_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::integrity(
            "decompressed payload does not match stored checksum",
            IntegrityErrorKind::ChecksumMismatch {
                expected: expected.into(),
                actual: actual.into(),
            },
        )
    }

    /// Create an integrity error for an undecodable payload
    pub fn corrupt(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::integrity(context, IntegrityErrorKind::CorruptPayload(reason.into()))
    }

    /// Create a cache error with context
    pub fn cache(context: impl Into<String>, source: CacheErrorKind) -> Self {
        Self::Cache {
            context: context.into(),
            source,
        }
    }

    /// Create a search error for malformed input
    pub fn malformed_query(reason: impl Into<String>) -> Self {
        Self::Search {
            context: "parsing query".to_string(),
            source: SearchErrorKind::MalformedQuery(reason.into()),
        }
    }

    /// Create a snapshot error for a missing version
    pub fn snapshot_not_found(matrix_id: i64, version: u32) -> Self {
        Self::Snapshot {
            context: "loading snapshot".to_string(),
            source: SnapshotErrorKind::NotFound { matrix_id, version },
        }
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let message = format!("{source}");
        Self::Io {
            path: Some(path),
            message,
            source,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is an integrity violation
    #[must_use]
    pub const fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}

// ============================================================================
// Conversions from existing error types
// ============================================================================

impl From<std::io::Error> for HistoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: None,
            message: format!("{err}"),
            source: err,
        }
    }
}

impl From<std::fmt::Error> for HistoryError {
    fn from(err: std::fmt::Error) -> Self {
        Self::report("formatting report", ReportErrorKind::Serialization(err.to_string()))
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::report("JSON serialization", ReportErrorKind::Serialization(err.to_string()))
    }
}

// ============================================================================
// Error context extension trait
// ============================================================================

/// Extension trait for adding context to errors.
///
/// The new context is prepended to the error's existing context, so a chain
/// reads outermost first: `"loading v3: decompressing: <cause>"`.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context from a closure, evaluated only on error.
    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: Into<HistoryError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        let ctx: String = context.into();
        self.map_err(|e| add_context_to_error(e.into(), &ctx))
    }

    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| {
            let ctx: String = f().into();
            add_context_to_error(e.into(), &ctx)
        })
    }
}

/// Add context to an error, chaining with any existing context.
fn add_context_to_error(err: HistoryError, new_ctx: &str) -> HistoryError {
    match err {
        HistoryError::Report {
            context: existing,
            source,
        } => HistoryError::Report {
            context: chain_context(new_ctx, &existing),
            source,
        },
        HistoryError::Integrity {
            context: existing,
            source,
        } => HistoryError::Integrity {
            context: chain_context(new_ctx, &existing),
            source,
        },
        HistoryError::Cache {
            context: existing,
            source,
        } => HistoryError::Cache {
            context: chain_context(new_ctx, &existing),
            source,
        },
        HistoryError::Search {
            context: existing,
            source,
        } => HistoryError::Search {
            context: chain_context(new_ctx, &existing),
            source,
        },
        HistoryError::Snapshot {
            context: existing,
            source,
        } => HistoryError::Snapshot {
            context: chain_context(new_ctx, &existing),
            source,
        },
        HistoryError::Io {
            path,
            message,
            source,
        } => HistoryError::Io {
            path,
            message: chain_context(new_ctx, &message),
            source,
        },
        HistoryError::Config(msg) => HistoryError::Config(chain_context(new_ctx, &msg)),
        HistoryError::Validation(msg) => HistoryError::Validation(chain_context(new_ctx, &msg)),
    }
}

/// Chain two context strings together.
fn chain_context(new: &str, existing: &str) -> String {
    if existing.is_empty() {
        new.to_string()
    } else {
        format!("{new}: {existing}")
    }
}

/// Extension trait for Option types to convert to errors with context.
pub trait OptionContext<T> {
    /// Convert None to an error with the given context.
    fn context_none(self, context: impl Into<String>) -> Result<T>;

    /// Convert None to an error with context from a closure.
    fn with_context_none<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> OptionContext<T> for Option<T> {
    fn context_none(self, context: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| HistoryError::Validation(context.into()))
    }

    fn with_context_none<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.ok_or_else(|| HistoryError::Validation(f().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HistoryError::unsupported_format("xml");
        let display = err.to_string();
        assert!(display.contains("xml"), "should name the format: {display}");

        let err = HistoryError::checksum_mismatch("abc", "def");
        assert!(err.is_integrity());
        assert!(err.to_string().contains("Integrity"));
    }

    #[test]
    fn test_error_chain() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = HistoryError::io("/path/to/snapshot.json", io_err);

        assert!(err.to_string().contains("/path/to/snapshot.json"));
    }

    #[test]
    fn test_context_chaining_multiple_levels() {
        fn inner() -> Result<()> {
            Err(HistoryError::corrupt("base", "bad gzip header"))
        }

        fn middle() -> Result<()> {
            inner().context("middle layer")
        }

        fn outer() -> Result<()> {
            middle().context("outer layer")
        }

        match outer() {
            Err(HistoryError::Integrity { context, .. }) => {
                assert_eq!(context, "outer layer: middle layer: base");
            }
            other => panic!("Expected Integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_with_context_lazy_evaluation() {
        let mut called = false;

        let ok_result: Result<i32> = Ok(42);
        let _ = ok_result.with_context(|| {
            called = true;
            "should not be called"
        });
        assert!(!called, "Closure should not be called for Ok result");

        let err_result: Result<i32> = Err(HistoryError::validation("error"));
        let _ = err_result.with_context(|| {
            called = true;
            "should be called"
        });
        assert!(called, "Closure should be called for Err result");
    }

    #[test]
    fn test_option_context() {
        let none_value: Option<i32> = None;
        match none_value.context_none("missing value") {
            Err(HistoryError::Validation(msg)) => assert_eq!(msg, "missing value"),
            other => panic!("Expected Validation error, got {other:?}"),
        }
        assert_eq!(Some(7).context_none("unused").ok(), Some(7));
    }

    #[test]
    fn test_chain_context_helper() {
        assert_eq!(chain_context("new", ""), "new");
        assert_eq!(chain_context("new", "existing"), "new: existing");
    }
}
