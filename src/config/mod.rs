//! Configuration for the matrix history engine.
//!
//! - Typed sections for cache, pagination, search, compression and notifications
//! - Validation for every section
//! - Named presets
//! - YAML config file loading and discovery
//!
//! # Configuration File
//!
//! Place a `.matrix-history.yaml` file in your working directory (or any
//! parent) or in `~/.config/matrix-history/`:
//!
//! ```yaml
//! cache:
//!   key_prefix: fw
//!   diff_ttl_secs: 3600
//! search:
//!   fuzzy_max_distance: 1
//! ```

mod defaults;
pub mod file;
mod types;
mod validation;

pub use defaults::{
    ConfigPreset, DEFAULT_COMPRESSION_LEVEL, DEFAULT_KEY_PREFIX, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use types::{
    AppConfig, AppConfigBuilder, CacheConfig, CompressionConfig, NotifierConfig, PaginationConfig,
    SearchConfig,
};
pub use validation::{ConfigError, Validatable};

pub use file::{
    discover_config_file, generate_example_config, load_config_file, load_or_default,
    ConfigFileError, CONFIG_ENV_VAR,
};

/// Generate a JSON Schema for the `AppConfig` configuration format.
///
/// Editors can use it to validate `.matrix-history.yaml` files.
#[must_use]
pub fn generate_json_schema() -> String {
    let schema = schemars::schema_for!(AppConfig);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
