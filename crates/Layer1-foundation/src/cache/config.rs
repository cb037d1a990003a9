//! Cache configuration

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Bounds for `max_items`
pub const CACHE_MAX_ITEMS_RANGE: (usize, usize) = (10, 1000);
/// Bounds for `ttl_minutes` (1 minute to 1 day)
pub const CACHE_TTL_MINUTES_RANGE: (u32, u32) = (1, 1440);

/// Response cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCacheConfig {
    /// Feature flag; disabled caches never store anything
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of cached responses
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Time-to-live of each response (minutes)
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u32,
}

// Default value functions
fn default_enabled() -> bool {
    true
}
fn default_max_items() -> usize {
    100
}
fn default_ttl_minutes() -> u32 {
    60
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_items: default_max_items(),
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl ResponseCacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Clamp every bounded field into its allowed range
    pub fn normalized(&self) -> Self {
        Self {
            enabled: self.enabled,
            max_items: self
                .max_items
                .clamp(CACHE_MAX_ITEMS_RANGE.0, CACHE_MAX_ITEMS_RANGE.1),
            ttl_minutes: self
                .ttl_minutes
                .clamp(CACHE_TTL_MINUTES_RANGE.0, CACHE_TTL_MINUTES_RANGE.1),
        }
    }

    /// TTL as Duration
    pub fn ttl(&self) -> Duration {
        Duration::minutes(i64::from(self.ttl_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps() {
        let config = ResponseCacheConfig {
            enabled: true,
            max_items: 5,
            ttl_minutes: 5000,
        }
        .normalized();
        assert_eq!(config.max_items, 10);
        assert_eq!(config.ttl_minutes, 1440);

        let config = ResponseCacheConfig {
            enabled: false,
            max_items: 5000,
            ttl_minutes: 0,
        }
        .normalized();
        assert_eq!(config.max_items, 1000);
        assert_eq!(config.ttl_minutes, 1);
        assert!(!config.enabled);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ResponseCacheConfig = serde_json::from_str(r#"{"maxItems": 20}"#).unwrap();
        assert_eq!(config.max_items, 20);
        assert_eq!(config.ttl_minutes, 60);
        assert!(config.enabled);
    }
}
