//! Collaborator contracts consumed by the write cache.
//!
//! The cache never talks to concrete stores. Hosts inject implementations of
//! these traits; `docstate-storage` provides in-memory ones.

use crate::{
    AbortSignal, Document, DocumentModule, Operation, OperationWithContext, RegistryError,
    StoreError, StreamKey,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Pagination request for operation log reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingOptions {
    /// Opaque cursor from a previous page's `next_cursor`. `None` starts at the beginning.
    pub cursor: Option<String>,
    pub limit: usize,
}

impl PagingOptions {
    pub fn first(limit: usize) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }
}

/// One page of operation log results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationPage {
    /// Operations in ascending index order.
    pub results: Vec<OperationWithContext>,
    /// Cursor for the following page, `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// A persisted full snapshot of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub key: StreamKey,
    pub revision: u64,
    pub document: Document,
}

/// Append-only operation log.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Append operations to a stream.
    ///
    /// Used by producers; the cache itself never writes to the log.
    async fn apply(
        &self,
        key: &StreamKey,
        document_type: &str,
        operations: Vec<Operation>,
    ) -> Result<(), StoreError>;

    /// Read operations of a stream with `index > since`, or every operation
    /// when `since` is `None`, one page at a time.
    ///
    /// Implementations must reject with [`StoreError::Aborted`] once `signal` fires.
    async fn get_since(
        &self,
        key: &StreamKey,
        since: Option<u64>,
        paging: PagingOptions,
        signal: Option<&AbortSignal>,
    ) -> Result<OperationPage, StoreError>;
}

/// Durable keyframe storage.
#[async_trait]
pub trait KeyframeStore: Send + Sync {
    async fn put_keyframe(
        &self,
        key: &StreamKey,
        revision: u64,
        document: &Document,
    ) -> Result<(), StoreError>;

    /// Keyframe with the greatest revision `<= target_revision`.
    async fn find_nearest_keyframe(
        &self,
        key: &StreamKey,
        target_revision: u64,
        signal: Option<&AbortSignal>,
    ) -> Result<Option<Keyframe>, StoreError>;

    /// Delete every keyframe of a stream, returning how many were removed.
    async fn delete_keyframes(&self, key: &StreamKey) -> Result<u64, StoreError>;
}

/// Resolves document types to their modules.
pub trait DocumentModelRegistry: Send + Sync {
    fn get_module(&self, document_type: &str) -> Result<Arc<DocumentModule>, RegistryError>;
}
