//! docstate Storage - Write Cache and In-Memory Collaborators
//!
//! The write cache lives in [`cache`]. The in-memory stores in [`memory`]
//! implement the collaborator traits from `docstate-core` for tests and
//! single-process embeddings.

pub mod cache;
pub mod memory;

pub use cache::{
    BaseSource, CacheStats, CacheStatsSnapshot, CachedSnapshot, KeyframeDecision, KeyframePolicy,
    KeyframeWriter, LruTracker, PendingKeyframe, PersistReason, PushOutcome, RebuildEngine,
    RebuildOutcome, RingBuffer, StreamSnapshot, WriteCache, WriteRateState,
};
pub use memory::{InMemoryKeyframeStore, InMemoryModuleRegistry, InMemoryOperationStore};
