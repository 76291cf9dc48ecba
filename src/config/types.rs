//! Configuration types for matrix history operations.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults;

// ============================================================================
// Unified Application Configuration
// ============================================================================

/// Unified application configuration loaded from config files and CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AppConfig {
    /// Cache TTLs and key namespace
    pub cache: CacheConfig,
    /// Diff pagination limits
    pub pagination: PaginationConfig,
    /// Search tuning
    pub search: SearchConfig,
    /// Snapshot compression settings
    pub compression: CompressionConfig,
    /// Realtime notification limits
    pub notifier: NotifierConfig,
}

impl AppConfig {
    /// Create a new `AppConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an `AppConfig` builder.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

// ============================================================================
// Builder for AppConfig
// ============================================================================

/// Builder for constructing `AppConfig` with fluent API.
#[derive(Debug, Default)]
#[must_use]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the cache key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.cache.key_prefix = prefix.into();
        self
    }

    /// Set the snapshot TTL in seconds.
    pub const fn snapshot_ttl(mut self, secs: u64) -> Self {
        self.config.cache.snapshot_ttl_secs = secs;
        self
    }

    /// Set the diff TTL in seconds.
    pub const fn diff_ttl(mut self, secs: u64) -> Self {
        self.config.cache.diff_ttl_secs = secs;
        self
    }

    /// Set default and maximum page sizes.
    pub const fn page_sizes(mut self, default_page_size: usize, max_page_size: usize) -> Self {
        self.config.pagination.default_page_size = default_page_size;
        self.config.pagination.max_page_size = max_page_size;
        self
    }

    /// Set the maximum number of search results.
    pub const fn max_search_results(mut self, max: usize) -> Self {
        self.config.search.max_results = max;
        self
    }

    /// Set the maximum edit distance for fuzzy search.
    pub const fn fuzzy_max_distance(mut self, distance: usize) -> Self {
        self.config.search.fuzzy_max_distance = distance;
        self
    }

    /// Set the gzip level.
    pub const fn compression_level(mut self, level: u32) -> Self {
        self.config.compression.level = level;
        self
    }

    /// Set the per-subscriber notification rate limit.
    pub const fn max_events_per_minute(mut self, max: u32) -> Self {
        self.config.notifier.max_events_per_minute = max;
        self
    }

    /// Build the `AppConfig`.
    #[must_use]
    pub fn build(self) -> AppConfig {
        self.config
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// TTLs per cached artifact kind, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace prepended to every cache key
    pub key_prefix: String,
    pub snapshot_ttl_secs: u64,
    pub diff_ttl_secs: u64,
    pub timeline_ttl_secs: u64,
    pub stats_ttl_secs: u64,
    pub impact_ttl_secs: u64,
    pub export_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: defaults::DEFAULT_KEY_PREFIX.to_string(),
            snapshot_ttl_secs: defaults::DEFAULT_SNAPSHOT_TTL,
            diff_ttl_secs: defaults::DEFAULT_DIFF_TTL,
            timeline_ttl_secs: defaults::DEFAULT_TIMELINE_TTL,
            stats_ttl_secs: defaults::DEFAULT_STATS_TTL,
            impact_ttl_secs: defaults::DEFAULT_IMPACT_TTL,
            export_ttl_secs: defaults::DEFAULT_EXPORT_TTL,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }

    #[must_use]
    pub const fn diff_ttl(&self) -> Duration {
        Duration::from_secs(self.diff_ttl_secs)
    }

    #[must_use]
    pub const fn timeline_ttl(&self) -> Duration {
        Duration::from_secs(self.timeline_ttl_secs)
    }

    #[must_use]
    pub const fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }

    #[must_use]
    pub const fn impact_ttl(&self) -> Duration {
        Duration::from_secs(self.impact_ttl_secs)
    }

    #[must_use]
    pub const fn export_ttl(&self) -> Duration {
        Duration::from_secs(self.export_ttl_secs)
    }
}

// ============================================================================
// Pagination Configuration
// ============================================================================

/// Page size limits for diff pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: usize,
    /// Requested page sizes are clamped to this value
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: defaults::DEFAULT_PAGE_SIZE,
            max_page_size: defaults::MAX_PAGE_SIZE,
        }
    }
}

// ============================================================================
// Search Configuration
// ============================================================================

/// Search tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchConfig {
    /// Result cap applied after scoring
    pub max_results: usize,
    /// Maximum Levenshtein distance for fuzzy term expansion
    pub fuzzy_max_distance: usize,
    pub autocomplete_limit: usize,
    /// Entries older than this are scored down
    pub stale_after_days: i64,
    pub suggestion_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: defaults::DEFAULT_MAX_RESULTS,
            fuzzy_max_distance: defaults::DEFAULT_FUZZY_DISTANCE,
            autocomplete_limit: defaults::DEFAULT_AUTOCOMPLETE_LIMIT,
            stale_after_days: defaults::DEFAULT_STALE_AFTER_DAYS,
            suggestion_limit: defaults::DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

// ============================================================================
// Compression Configuration
// ============================================================================

/// Snapshot compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CompressionConfig {
    /// gzip level, 0 to 9
    pub level: u32,
    /// Payloads below this size are not worth compressing
    pub min_size_bytes: usize,
    /// Estimated saving required before compression is recommended
    pub min_ratio_percent: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_COMPRESSION_LEVEL,
            min_size_bytes: defaults::DEFAULT_MIN_COMPRESS_SIZE,
            min_ratio_percent: defaults::DEFAULT_MIN_RATIO_PERCENT,
        }
    }
}

// ============================================================================
// Notifier Configuration
// ============================================================================

/// Realtime notification limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NotifierConfig {
    /// Events delivered per subscriber per minute; excess events are dropped
    pub max_events_per_minute: u32,
    /// Buffered events per subscriber channel
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_events_per_minute: defaults::DEFAULT_EVENTS_PER_MINUTE,
            channel_capacity: defaults::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.cache.key_prefix, "matrix");
        assert_eq!(config.cache.diff_ttl(), Duration::from_secs(43_200));
        assert_eq!(config.pagination.max_page_size, 200);
        assert_eq!(config.search.fuzzy_max_distance, 2);
        assert_eq!(config.compression.level, 6);
        assert_eq!(config.notifier.max_events_per_minute, 60);
    }

    #[test]
    fn test_builder() {
        let config = AppConfig::builder()
            .key_prefix("fw")
            .page_sizes(25, 100)
            .fuzzy_max_distance(1)
            .compression_level(9)
            .build();
        assert_eq!(config.cache.key_prefix, "fw");
        assert_eq!(config.pagination.default_page_size, 25);
        assert_eq!(config.search.fuzzy_max_distance, 1);
        assert_eq!(config.compression.level, 9);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("search:\n  max_results: 5\n").expect("parse");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.autocomplete_limit, 10);
        assert_eq!(config.cache, CacheConfig::default());
    }
}
