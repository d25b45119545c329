//! In-memory collaborator implementations.
//!
//! Suitable for unit tests, development, and single-process embeddings where
//! durability is not required. Each store holds its data behind an `RwLock`.

use async_trait::async_trait;
use docstate_core::{
    AbortSignal, Document, DocumentModelRegistry, DocumentModule, Keyframe, KeyframeStore,
    Operation, OperationContext, OperationPage, OperationStore, OperationWithContext,
    PagingOptions, RegistryError, StoreError, StreamKey,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

fn reject_if_aborted(signal: Option<&AbortSignal>) -> Result<(), StoreError> {
    if signal.is_some_and(AbortSignal::is_aborted) {
        Err(StoreError::Aborted)
    } else {
        Ok(())
    }
}

// ============================================================================
// OPERATION STORE
// ============================================================================

/// In-memory operation log.
///
/// Cursors are the index of the last operation on the previous page.
#[derive(Debug, Default)]
pub struct InMemoryOperationStore {
    streams: RwLock<HashMap<StreamKey, Vec<OperationWithContext>>>,
    next_ordinal: RwLock<u64>,
}

impl InMemoryOperationStore {
    /// Create a new empty operation store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations stored for a stream.
    pub fn len(&self, key: &StreamKey) -> Result<usize, StoreError> {
        let streams = self.streams.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(streams.get(key).map_or(0, Vec::len))
    }

    /// Remove operations with `index <= up_to` from a stream.
    ///
    /// Lets tests prove a rebuild did not re-read history below its base.
    pub fn truncate_through(&self, key: &StreamKey, up_to: u64) -> Result<usize, StoreError> {
        let mut streams = self.streams.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(ops) = streams.get_mut(key) else {
            return Ok(0);
        };
        let before = ops.len();
        ops.retain(|op| op.operation.index > up_to);
        Ok(before - ops.len())
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn apply(
        &self,
        key: &StreamKey,
        document_type: &str,
        operations: Vec<Operation>,
    ) -> Result<(), StoreError> {
        let mut streams = self.streams.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut ordinal = self
            .next_ordinal
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;

        let stream = streams.entry(key.clone()).or_default();
        let mut last = stream.last().map(|op| op.operation.index);

        // Validate the whole batch before appending any of it
        for op in &operations {
            if let Some(prev) = last {
                if op.index <= prev {
                    return Err(StoreError::RevisionConflict {
                        stream: key.to_string(),
                        expected_after: prev,
                        found: op.index,
                    });
                }
            }
            last = Some(op.index);
        }

        for operation in operations {
            *ordinal += 1;
            stream.push(OperationWithContext {
                operation,
                context: OperationContext {
                    document_id: key.document_id.clone(),
                    document_type: document_type.to_string(),
                    scope: key.scope.clone(),
                    branch: key.branch.clone(),
                    ordinal: *ordinal,
                },
            });
        }

        Ok(())
    }

    async fn get_since(
        &self,
        key: &StreamKey,
        since: Option<u64>,
        paging: PagingOptions,
        signal: Option<&AbortSignal>,
    ) -> Result<OperationPage, StoreError> {
        reject_if_aborted(signal)?;

        let after_cursor = paging
            .cursor
            .as_deref()
            .map(|c| {
                c.parse::<u64>().map_err(|_| StoreError::InvalidCursor {
                    cursor: c.to_string(),
                })
            })
            .transpose()?;

        let streams = self.streams.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(ops) = streams.get(key) else {
            return Ok(OperationPage::default());
        };

        let mut remaining = ops.iter().filter(|op| {
            let index = op.operation.index;
            since.map_or(true, |s| index > s) && after_cursor.map_or(true, |c| index > c)
        });

        let results: Vec<OperationWithContext> =
            remaining.by_ref().take(paging.limit).cloned().collect();
        let next_cursor = match (remaining.next(), results.last()) {
            (Some(_), Some(last)) => Some(last.operation.index.to_string()),
            _ => None,
        };

        Ok(OperationPage {
            results,
            next_cursor,
        })
    }
}

// ============================================================================
// KEYFRAME STORE
// ============================================================================

/// In-memory keyframe store, ordered by revision per stream.
#[derive(Debug, Default)]
pub struct InMemoryKeyframeStore {
    keyframes: RwLock<HashMap<StreamKey, BTreeMap<u64, Document>>>,
}

impl InMemoryKeyframeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revisions stored for a stream, ascending.
    pub fn revisions(&self, key: &StreamKey) -> Result<Vec<u64>, StoreError> {
        let keyframes = self.keyframes.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(keyframes
            .get(key)
            .map(|revs| revs.keys().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl KeyframeStore for InMemoryKeyframeStore {
    async fn put_keyframe(
        &self,
        key: &StreamKey,
        revision: u64,
        document: &Document,
    ) -> Result<(), StoreError> {
        let mut keyframes = self.keyframes.write().map_err(|_| StoreError::LockPoisoned)?;
        keyframes
            .entry(key.clone())
            .or_default()
            .insert(revision, document.clone());
        Ok(())
    }

    async fn find_nearest_keyframe(
        &self,
        key: &StreamKey,
        target_revision: u64,
        signal: Option<&AbortSignal>,
    ) -> Result<Option<Keyframe>, StoreError> {
        reject_if_aborted(signal)?;

        let keyframes = self.keyframes.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(keyframes.get(key).and_then(|revs| {
            revs.range(..=target_revision)
                .next_back()
                .map(|(revision, document)| Keyframe {
                    key: key.clone(),
                    revision: *revision,
                    document: document.clone(),
                })
        }))
    }

    async fn delete_keyframes(&self, key: &StreamKey) -> Result<u64, StoreError> {
        let mut keyframes = self.keyframes.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(keyframes.remove(key).map_or(0, |revs| revs.len() as u64))
    }
}

// ============================================================================
// MODULE REGISTRY
// ============================================================================

/// Registry of document model modules keyed by document type.
#[derive(Debug, Default)]
pub struct InMemoryModuleRegistry {
    modules: RwLock<HashMap<String, Arc<DocumentModule>>>,
}

impl InMemoryModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `modules`.
    pub fn with_modules(modules: impl IntoIterator<Item = DocumentModule>) -> Self {
        let registry = Self::new();
        for module in modules {
            registry.register(module);
        }
        registry
    }

    /// Register or replace a module.
    pub fn register(&self, module: DocumentModule) {
        let mut modules = self
            .modules
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        modules.insert(module.document_type.clone(), Arc::new(module));
    }

    /// Remove a module, returning whether it was registered.
    pub fn unregister(&self, document_type: &str) -> bool {
        let mut modules = self
            .modules
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        modules.remove(document_type).is_some()
    }
}

impl DocumentModelRegistry for InMemoryModuleRegistry {
    fn get_module(&self, document_type: &str) -> Result<Arc<DocumentModule>, RegistryError> {
        let modules = self
            .modules
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        modules
            .get(document_type)
            .cloned()
            .ok_or_else(|| RegistryError::ModuleNotFound {
                document_type: document_type.to_string(),
            })
    }
}
