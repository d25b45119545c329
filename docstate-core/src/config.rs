//! Write cache configuration

use crate::{ConfigError, DocStateError, DocStateResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the write cache.
///
/// Immutable for the lifetime of a cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of streams held at once (not document ids).
    pub max_documents: usize,
    /// Snapshots retained per stream.
    pub ring_buffer_size: usize,
    /// Writes closer together than this are classified as hot.
    pub hot_threshold: Duration,
    /// Revisions between keyframes while a stream is hot.
    pub hot_keyframe_interval: u64,
    /// Revisions between keyframes while a stream is cold.
    pub cold_keyframe_interval: u64,
    /// Operations requested per log page during rebuild.
    pub rebuild_page_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_documents: 1000,
            ring_buffer_size: 10,
            hot_threshold: Duration::from_secs(1),
            hot_keyframe_interval: 50,
            cold_keyframe_interval: 10,
            rebuild_page_size: 100,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached streams.
    pub fn with_max_documents(mut self, max: usize) -> Self {
        self.max_documents = max;
        self
    }

    /// Set the number of snapshots kept per stream.
    pub fn with_ring_buffer_size(mut self, size: usize) -> Self {
        self.ring_buffer_size = size;
        self
    }

    /// Set the hot write threshold.
    pub fn with_hot_threshold(mut self, threshold: Duration) -> Self {
        self.hot_threshold = threshold;
        self
    }

    /// Set the keyframe interval used while hot.
    pub fn with_hot_keyframe_interval(mut self, interval: u64) -> Self {
        self.hot_keyframe_interval = interval;
        self
    }

    /// Set the keyframe interval used while cold.
    pub fn with_cold_keyframe_interval(mut self, interval: u64) -> Self {
        self.cold_keyframe_interval = interval;
        self
    }

    /// Set the rebuild page size.
    pub fn with_rebuild_page_size(mut self, size: usize) -> Self {
        self.rebuild_page_size = size;
        self
    }

    /// Hot threshold in milliseconds, saturating at `i64::MAX`.
    pub fn hot_threshold_ms(&self) -> i64 {
        i64::try_from(self.hot_threshold.as_millis()).unwrap_or(i64::MAX)
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `DOCSTATE_CACHE_MAX_DOCUMENTS` (default: 1000)
    /// - `DOCSTATE_CACHE_RING_BUFFER_SIZE` (default: 10)
    /// - `DOCSTATE_CACHE_HOT_THRESHOLD_MS` (default: 1000)
    /// - `DOCSTATE_CACHE_HOT_KEYFRAME_INTERVAL` (default: 50)
    /// - `DOCSTATE_CACHE_COLD_KEYFRAME_INTERVAL` (default: 10)
    /// - `DOCSTATE_CACHE_REBUILD_PAGE_SIZE` (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_documents: env_or("DOCSTATE_CACHE_MAX_DOCUMENTS", defaults.max_documents),
            ring_buffer_size: env_or("DOCSTATE_CACHE_RING_BUFFER_SIZE", defaults.ring_buffer_size),
            hot_threshold: std::env::var("DOCSTATE_CACHE_HOT_THRESHOLD_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.hot_threshold),
            hot_keyframe_interval: env_or(
                "DOCSTATE_CACHE_HOT_KEYFRAME_INTERVAL",
                defaults.hot_keyframe_interval,
            ),
            cold_keyframe_interval: env_or(
                "DOCSTATE_CACHE_COLD_KEYFRAME_INTERVAL",
                defaults.cold_keyframe_interval,
            ),
            rebuild_page_size: env_or("DOCSTATE_CACHE_REBUILD_PAGE_SIZE", defaults.rebuild_page_size),
        }
    }

    /// Validate the configuration.
    ///
    /// Every count and interval must be greater than 0, and the hot threshold
    /// must be positive.
    pub fn validate(&self) -> DocStateResult<()> {
        let counts = [
            ("max_documents", self.max_documents as u64),
            ("ring_buffer_size", self.ring_buffer_size as u64),
            ("hot_keyframe_interval", self.hot_keyframe_interval),
            ("cold_keyframe_interval", self.cold_keyframe_interval),
            ("rebuild_page_size", self.rebuild_page_size as u64),
        ];

        for (field, value) in counts {
            if value == 0 {
                return Err(invalid(field, value.to_string(), "must be greater than 0"));
            }
        }

        if self.hot_threshold.is_zero() {
            return Err(invalid(
                "hot_threshold",
                format!("{:?}", self.hot_threshold),
                "hot_threshold must be positive",
            ));
        }

        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn invalid(field: &str, value: String, reason: &str) -> DocStateError {
    DocStateError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}
