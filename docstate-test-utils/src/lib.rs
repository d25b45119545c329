//! docstate Test Utilities
//!
//! Centralized test infrastructure for the docstate workspace:
//! - Counter document model fixture and operation builders
//! - Mock collaborators with fault injection
//! - Proptest generators

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::{
    counter_document, counter_module, create_document_operation, delete_document_operation,
    failing, increment, increments, operation, upgrade_document_operation, BASE_TIMESTAMP_MS,
    COUNTER_TYPE,
};
pub use generators::{arb_counter_document, arb_revisions, arb_stream_key};
pub use mocks::{FaultyOperationStore, RecordedRead, RecordingKeyframeStore};

// Re-export core types for convenience
pub use docstate_core::{
    AbortController, AbortSignal, CacheConfig, DocStateError, Document, DocumentModule,
    ManualClock, StoreError, StreamKey, DOCUMENT_SCOPE, GLOBAL_SCOPE, LOCAL_SCOPE, MAIN_BRANCH,
};
