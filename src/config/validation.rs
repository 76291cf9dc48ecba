//! Configuration validation.

use super::types::{
    AppConfig, CacheConfig, CompressionConfig, NotifierConfig, PaginationConfig, SearchConfig,
};

// ============================================================================
// Configuration Error
// ============================================================================

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// The field that failed validation
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Validation Trait
// ============================================================================

/// Trait for validatable configuration types.
pub trait Validatable {
    /// Validate the configuration, returning any errors found.
    fn validate(&self) -> Vec<ConfigError>;

    /// Check if the configuration is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

// ============================================================================
// Validation Implementations
// ============================================================================

impl Validatable for AppConfig {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.cache.validate());
        errors.extend(self.pagination.validate());
        errors.extend(self.search.validate());
        errors.extend(self.compression.validate());
        errors.extend(self.notifier.validate());
        errors
    }
}

impl Validatable for CacheConfig {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.key_prefix.trim().is_empty() {
            errors.push(ConfigError::new("cache.key_prefix", "Key prefix must not be empty"));
        }
        if self.key_prefix.contains(['*', '?', ' ']) {
            errors.push(ConfigError::new(
                "cache.key_prefix",
                format!("Key prefix '{}' must not contain wildcards or spaces", self.key_prefix),
            ));
        }

        let ttls = [
            ("cache.snapshot_ttl_secs", self.snapshot_ttl_secs),
            ("cache.diff_ttl_secs", self.diff_ttl_secs),
            ("cache.timeline_ttl_secs", self.timeline_ttl_secs),
            ("cache.stats_ttl_secs", self.stats_ttl_secs),
            ("cache.impact_ttl_secs", self.impact_ttl_secs),
            ("cache.export_ttl_secs", self.export_ttl_secs),
        ];
        for (field, ttl) in ttls {
            if ttl == 0 {
                errors.push(ConfigError::new(field, "TTL must be greater than 0"));
            }
        }
        errors
    }
}

impl Validatable for PaginationConfig {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.max_page_size == 0 {
            errors.push(ConfigError::new("pagination.max_page_size", "Must be at least 1"));
        }
        if self.default_page_size == 0 {
            errors.push(ConfigError::new("pagination.default_page_size", "Must be at least 1"));
        } else if self.default_page_size > self.max_page_size {
            errors.push(ConfigError::new(
                "pagination.default_page_size",
                format!(
                    "Default page size {} exceeds max_page_size {}",
                    self.default_page_size, self.max_page_size
                ),
            ));
        }
        errors
    }
}

impl Validatable for SearchConfig {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.max_results == 0 {
            errors.push(ConfigError::new("search.max_results", "Must be at least 1"));
        }
        if self.fuzzy_max_distance > 5 {
            errors.push(ConfigError::new(
                "search.fuzzy_max_distance",
                format!("Distance must be between 0 and 5, got {}", self.fuzzy_max_distance),
            ));
        }
        if self.stale_after_days < 0 {
            errors.push(ConfigError::new("search.stale_after_days", "Must not be negative"));
        }
        errors
    }
}

impl Validatable for CompressionConfig {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.level > 9 {
            errors.push(ConfigError::new(
                "compression.level",
                format!("gzip level must be between 0 and 9, got {}", self.level),
            ));
        }
        if self.min_ratio_percent > 100 {
            errors.push(ConfigError::new(
                "compression.min_ratio_percent",
                format!("Percentage must be at most 100, got {}", self.min_ratio_percent),
            ));
        }
        errors
    }
}

impl Validatable for NotifierConfig {
    fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.max_events_per_minute == 0 {
            errors.push(ConfigError::new("notifier.max_events_per_minute", "Must be at least 1"));
        }
        if self.channel_capacity == 0 {
            errors.push(ConfigError::new("notifier.channel_capacity", "Must be at least 1"));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().is_valid());
    }

    #[test]
    fn test_page_size_ordering() {
        let config = PaginationConfig {
            default_page_size: 300,
            max_page_size: 200,
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "pagination.default_page_size");
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = CacheConfig {
            stats_ttl_secs: 0,
            ..CacheConfig::default()
        };
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "cache.stats_ttl_secs"));
    }

    #[test]
    fn test_compression_level_range() {
        let config = AppConfig::builder().compression_level(12).build();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("compression.level:"));
    }

    #[test]
    fn test_rate_limit_must_be_positive() {
        let config = AppConfig::builder().max_events_per_minute(0).build();
        assert!(!config.is_valid());
    }
}
