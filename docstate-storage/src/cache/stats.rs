//! Write cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated concurrently.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    warm_misses: AtomicU64,
    cold_misses: AtomicU64,
    evictions: AtomicU64,
    keyframes_persisted: AtomicU64,
    keyframe_failures: AtomicU64,
    rebuild_failures: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warm_miss(&self) {
        self.warm_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cold_miss(&self) {
        self.cold_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_keyframe_persisted(&self) {
        self.keyframes_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_keyframe_failure(&self) {
        self.keyframe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rebuild_failure(&self) {
        self.rebuild_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            warm_misses: self.warm_misses.load(Ordering::Relaxed),
            cold_misses: self.cold_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            keyframes_persisted: self.keyframes_persisted.load(Ordering::Relaxed),
            keyframe_failures: self.keyframe_failures.load(Ordering::Relaxed),
            rebuild_failures: self.rebuild_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Reads served straight from a ring buffer.
    pub hits: u64,
    /// Rebuilds based on a cached snapshot.
    pub warm_misses: u64,
    /// Rebuilds based on a keyframe or the log start.
    pub cold_misses: u64,
    /// Streams dropped for capacity.
    pub evictions: u64,
    pub keyframes_persisted: u64,
    pub keyframe_failures: u64,
    pub rebuild_failures: u64,
}

impl CacheStatsSnapshot {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.warm_misses + self.cold_misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
