//! Default values and named presets.

use super::types::{AppConfig, CompressionConfig, NotifierConfig, PaginationConfig, SearchConfig};

pub const DEFAULT_KEY_PREFIX: &str = "matrix";

/// 24 hours
pub const DEFAULT_SNAPSHOT_TTL: u64 = 86_400;
/// 12 hours
pub const DEFAULT_DIFF_TTL: u64 = 43_200;
pub const DEFAULT_TIMELINE_TTL: u64 = 3_600;
pub const DEFAULT_STATS_TTL: u64 = 1_800;
pub const DEFAULT_IMPACT_TTL: u64 = 7_200;
pub const DEFAULT_EXPORT_TTL: u64 = 21_600;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const DEFAULT_FUZZY_DISTANCE: usize = 2;
pub const DEFAULT_AUTOCOMPLETE_LIMIT: usize = 10;
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 30;
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
pub const DEFAULT_MIN_COMPRESS_SIZE: usize = 10_000;
pub const DEFAULT_MIN_RATIO_PERCENT: u32 = 40;

pub const DEFAULT_EVENTS_PER_MINUTE: u32 = 60;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Configuration Presets
// ============================================================================

/// Named configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPreset {
    /// Balanced settings
    Default,
    /// Smaller pages, tighter result caps, maximum compression
    LowMemory,
    /// Larger pages and result caps, fast compression
    HighThroughput,
}

impl ConfigPreset {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::LowMemory => "low-memory",
            Self::HighThroughput => "high-throughput",
        }
    }

    /// Parse a preset from a string name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" | "balanced" => Some(Self::Default),
            "low-memory" | "low_memory" | "small" => Some(Self::LowMemory),
            "high-throughput" | "high_throughput" | "fast" => Some(Self::HighThroughput),
            _ => None,
        }
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Default => "Balanced settings suitable for most matrices",
            Self::LowMemory => "Small pages and result sets with maximum compression",
            Self::HighThroughput => "Large pages and result sets with fast compression",
        }
    }

    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Default, Self::LowMemory, Self::HighThroughput]
    }
}

impl std::fmt::Display for ConfigPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Preset Implementations
// ============================================================================

impl AppConfig {
    /// Create an `AppConfig` from a named preset.
    #[must_use]
    pub fn from_preset(preset: ConfigPreset) -> Self {
        match preset {
            ConfigPreset::Default => Self::default(),
            ConfigPreset::LowMemory => Self::low_memory_preset(),
            ConfigPreset::HighThroughput => Self::high_throughput_preset(),
        }
    }

    #[must_use]
    pub fn low_memory_preset() -> Self {
        Self {
            pagination: PaginationConfig {
                default_page_size: 25,
                max_page_size: 100,
            },
            search: SearchConfig {
                max_results: 50,
                fuzzy_max_distance: 1,
                ..SearchConfig::default()
            },
            compression: CompressionConfig {
                level: 9,
                min_size_bytes: 4_096,
                ..CompressionConfig::default()
            },
            notifier: NotifierConfig {
                channel_capacity: 64,
                ..NotifierConfig::default()
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn high_throughput_preset() -> Self {
        Self {
            pagination: PaginationConfig {
                default_page_size: 100,
                max_page_size: MAX_PAGE_SIZE,
            },
            search: SearchConfig {
                max_results: 500,
                ..SearchConfig::default()
            },
            compression: CompressionConfig {
                level: 1,
                ..CompressionConfig::default()
            },
            notifier: NotifierConfig {
                max_events_per_minute: 600,
                channel_capacity: 1_024,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Validatable;

    #[test]
    fn test_preset_names_round_trip() {
        for preset in ConfigPreset::all() {
            assert_eq!(ConfigPreset::from_name(preset.name()), Some(*preset));
        }
        assert_eq!(ConfigPreset::from_name("FAST"), Some(ConfigPreset::HighThroughput));
        assert_eq!(ConfigPreset::from_name("nope"), None);
    }

    #[test]
    fn test_presets_are_valid() {
        for preset in ConfigPreset::all() {
            let config = AppConfig::from_preset(*preset);
            assert!(config.is_valid(), "{preset} preset is invalid: {:?}", config.validate());
        }
    }
}
