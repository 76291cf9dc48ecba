//! CLI command handlers.
//!
//! Handlers are invoked by `main.rs` and return the process exit code, so
//! they can be exercised directly from tests.

mod compress;
mod diff;
mod input;
mod search;

pub use compress::{run_analyze, run_compress, run_decompress};
pub use diff::{run_diff, run_impact, run_page, DiffCommand, PageCommand};
pub use input::{load_snapshot_file, SnapshotDocument};
pub use search::{run_autocomplete, run_search, SearchCommand};

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

/// Process exit codes
pub mod exit_codes {
    /// No changes detected
    pub const SUCCESS: i32 = 0;
    /// Changes were detected
    pub const CHANGES_DETECTED: i32 = 1;
    /// A search returned no hits, as `grep` reports it
    pub const NO_MATCHES: i32 = 1;
    /// A critical-risk change was detected with `--fail-on-critical`
    pub const CRITICAL_RISK: i32 = 2;
    /// An error occurred
    pub const ERROR: i32 = 3;
}

/// Where command output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    #[must_use]
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Stdout, Self::File)
    }

    /// Write text, adding a trailing newline on stdout.
    pub fn write(&self, content: &str) -> Result<()> {
        match self {
            Self::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(content.as_bytes())?;
                if !content.ends_with('\n') {
                    stdout.write_all(b"\n")?;
                }
                Ok(())
            }
            Self::File(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!("Wrote {}", path.display());
                Ok(())
            }
        }
    }
}
