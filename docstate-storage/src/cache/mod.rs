//! Document-state write cache.
//!
//! Serves point-in-time document snapshots without replaying the whole
//! operation log on every read. Each `(document_id, scope, branch)` stream
//! keeps a bounded revision history; streams are bounded by LRU eviction;
//! and the newest snapshot of a stream is persisted as a keyframe according
//! to its write rate.
//!
//! # Layers
//!
//! - [`RingBuffer`]: per-stream revision history
//! - [`LruTracker`]: stream recency and capacity
//! - [`KeyframePolicy`]: hot/cold keyframe decisions
//! - [`KeyframeWriter`]: best-effort background keyframe writes
//! - [`RebuildEngine`]: reconstruction from snapshot, keyframe, or log start
//! - [`WriteCache`]: the façade tying them together
//!
//! # Example
//!
//! ```ignore
//! let cache = WriteCache::new(operations, keyframes, registry, CacheConfig::default())?;
//! cache.startup().await;
//!
//! let doc = cache.get_state("doc1", "global", "main", Some(42), None).await?;
//! cache.put_state("doc1", "global", "main", 43, &next);
//!
//! cache.shutdown().await;
//! ```

pub mod keyframe_policy;
pub mod lru_tracker;
pub mod persist;
pub mod rebuild;
pub mod ring_buffer;
pub mod stats;
pub mod write_cache;

pub use keyframe_policy::{KeyframeDecision, KeyframePolicy, PersistReason, WriteRateState};
pub use lru_tracker::LruTracker;
pub use persist::{KeyframeWriter, PendingKeyframe};
pub use rebuild::{BaseSource, RebuildEngine, RebuildOutcome};
pub use ring_buffer::{CachedSnapshot, PushOutcome, RingBuffer};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use write_cache::{StreamSnapshot, WriteCache};
