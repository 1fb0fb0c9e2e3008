//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ConfigError, TallyError, TallyResult};

/// Default for [`EngineConfig::default_page_size`].
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Tunables for query composition, metadata caching and storage calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Page size used when a request carries no pagination or no page size.
    pub default_page_size: i64,
    /// Largest page a caller may request.
    pub max_page_size: i64,
    /// Cap on default display fields.
    pub display_field_limit: usize,
    /// Cap on default search fields.
    pub search_field_limit: usize,
    /// How long resolved object schemas stay cached.
    pub metadata_cache_ttl: Duration,
    /// Upper bound on a single storage collaborator call.
    pub storage_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: 500,
            display_field_limit: 6,
            search_field_limit: 4,
            metadata_cache_ttl: Duration::from_secs(300),
            storage_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `TALLY_DEFAULT_PAGE_SIZE` (default: 25)
    /// - `TALLY_MAX_PAGE_SIZE` (default: 500)
    /// - `TALLY_DISPLAY_FIELD_LIMIT` (default: 6)
    /// - `TALLY_SEARCH_FIELD_LIMIT` (default: 4)
    /// - `TALLY_METADATA_CACHE_TTL_SECS` (default: 300)
    /// - `TALLY_STORAGE_TIMEOUT_MS` (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_page_size: env_parse("TALLY_DEFAULT_PAGE_SIZE")
                .unwrap_or(defaults.default_page_size),
            max_page_size: env_parse("TALLY_MAX_PAGE_SIZE").unwrap_or(defaults.max_page_size),
            display_field_limit: env_parse("TALLY_DISPLAY_FIELD_LIMIT")
                .unwrap_or(defaults.display_field_limit),
            search_field_limit: env_parse("TALLY_SEARCH_FIELD_LIMIT")
                .unwrap_or(defaults.search_field_limit),
            metadata_cache_ttl: env_parse("TALLY_METADATA_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.metadata_cache_ttl),
            storage_timeout: env_parse("TALLY_STORAGE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.storage_timeout),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - default_page_size > 0 and <= max_page_size
    /// - display_field_limit > 0
    /// - storage_timeout is positive
    pub fn validate(&self) -> TallyResult<()> {
        if self.max_page_size <= 0 {
            return Err(invalid(
                "max_page_size",
                self.max_page_size.to_string(),
                "max_page_size must be greater than 0",
            ));
        }

        if self.default_page_size <= 0 || self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                self.default_page_size.to_string(),
                "default_page_size must be between 1 and max_page_size",
            ));
        }

        if self.display_field_limit == 0 {
            return Err(invalid(
                "display_field_limit",
                self.display_field_limit.to_string(),
                "display_field_limit must be greater than 0",
            ));
        }

        if self.storage_timeout.is_zero() {
            return Err(invalid(
                "storage_timeout",
                format!("{:?}", self.storage_timeout),
                "storage_timeout must be positive",
            ));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn invalid(field: &str, value: String, reason: &str) -> TallyError {
    TallyError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = EngineConfig {
            storage_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        match config.validate() {
            Err(TallyError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "storage_timeout")
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_default_above_max() {
        let config = EngineConfig {
            default_page_size: 1000,
            max_page_size: 100,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any non-positive default page size is rejected, naming the field.
        #[test]
        fn prop_config_rejects_non_positive_page_size(size in i64::MIN..=0) {
            let config = EngineConfig { default_page_size: size, ..EngineConfig::default() };
            let result = config.validate();
            if let Err(TallyError::Config(ConfigError::InvalidValue { field, .. })) = result {
                prop_assert_eq!(field, "default_page_size");
            } else {
                prop_assert!(false, "Expected ConfigError::InvalidValue");
            }
        }

        /// Any page size within [1, max] is accepted.
        #[test]
        fn prop_config_accepts_page_size_in_range(size in 1i64..=500) {
            let config = EngineConfig { default_page_size: size, ..EngineConfig::default() };
            prop_assert!(config.validate().is_ok());
        }
    }
}
