//! Document reconstruction on cache miss.
//!
//! A rebuild starts from the best available base and replays the operation
//! log forward through the document type's reducer:
//!
//! 1. a cached snapshot at or below the target (warm miss)
//! 2. the nearest persisted keyframe (cold miss)
//! 3. the document's `CREATE_DOCUMENT` operation (full rebuild)
//!
//! The engine never touches cache state. The write cache commits the outcome
//! only once the rebuild has fully succeeded.

use super::ring_buffer::CachedSnapshot;
use docstate_core::{
    check_aborted, AbortSignal, CreateDocumentInput, DocStateError, DocStateResult, Document,
    DocumentModelRegistry, DocumentModule, KeyframeStore, Operation, OperationStore,
    PagingOptions, StoreError, StreamKey, UpgradeDocumentInput, CREATE_DOCUMENT, DELETE_DOCUMENT,
    DOCUMENT_SCOPE, UPGRADE_DOCUMENT,
};
use std::sync::Arc;

/// Where a rebuild started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSource {
    RingBuffer,
    Keyframe,
    Empty,
}

/// A successfully rebuilt document.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildOutcome {
    pub document: Document,
    /// Revision the document should be cached at.
    pub revision: u64,
    pub base_source: BaseSource,
    /// Last revision known to be keyframed for this stream.
    pub baseline: u64,
    pub operations_applied: usize,
}

struct Base {
    document: Document,
    revision: u64,
    source: BaseSource,
    module: Option<Arc<DocumentModule>>,
}

/// Running state of a replay.
struct Replay {
    document: Document,
    last_index: Option<u64>,
    last_timestamp_ms: Option<i64>,
    applied: usize,
}

/// Rebuilds documents from keyframes and the operation log.
pub struct RebuildEngine<O, K, R> {
    operations: Arc<O>,
    keyframes: Arc<K>,
    registry: Arc<R>,
    page_size: usize,
}

impl<O, K, R> RebuildEngine<O, K, R>
where
    O: OperationStore,
    K: KeyframeStore,
    R: DocumentModelRegistry,
{
    pub fn new(operations: Arc<O>, keyframes: Arc<K>, registry: Arc<R>, page_size: usize) -> Self {
        Self {
            operations,
            keyframes,
            registry,
            page_size: page_size.max(1),
        }
    }

    /// Rebuild `key` at `target`, or at the newest logged revision when `None`.
    ///
    /// `cached_base`, when given, must be at or below `target`.
    pub async fn rebuild(
        &self,
        key: &StreamKey,
        target: Option<u64>,
        cached_base: Option<CachedSnapshot>,
        signal: Option<&AbortSignal>,
    ) -> DocStateResult<RebuildOutcome> {
        check_aborted(signal)?;

        let base = match cached_base {
            Some(snapshot) => Base {
                document: Arc::unwrap_or_clone(snapshot.document),
                revision: snapshot.revision,
                source: BaseSource::RingBuffer,
                module: None,
            },
            None => self.cold_base(key, target, signal).await?,
        };

        let module = match base.module {
            Some(module) => module,
            None => self.registry.get_module(base.document.document_type())?,
        };

        let replay = self
            .replay(
                key,
                &module,
                Replay::from(base.document),
                base.revision,
                target,
                signal,
            )
            .await?;

        if base.source == BaseSource::Empty && replay.applied == 0 && target.is_some_and(|t| t > 0)
        {
            return Err(DocStateError::NoOperations {
                document_id: key.document_id.clone(),
                scope: key.scope.clone(),
                branch: key.branch.clone(),
            });
        }

        // A target past the end of the log resolves to the last logged revision
        let revision = replay.last_index.unwrap_or(base.revision);
        let mut document = replay.document;
        document.set_revision(key.scope.clone(), revision);
        if let Some(ts) = replay.last_timestamp_ms {
            document.header.last_modified_at_utc_ms = ts;
        }

        let baseline = match base.source {
            BaseSource::Keyframe => base.revision,
            BaseSource::RingBuffer | BaseSource::Empty => 0,
        };

        Ok(RebuildOutcome {
            document,
            revision,
            base_source: base.source,
            baseline,
            operations_applied: replay.applied,
        })
    }

    /// Nearest keyframe, or a freshly created document.
    async fn cold_base(
        &self,
        key: &StreamKey,
        target: Option<u64>,
        signal: Option<&AbortSignal>,
    ) -> DocStateResult<Base> {
        // Revision 0 is the created document, never a keyframe
        if target != Some(0) {
            check_aborted(signal)?;
            let keyframe = self
                .keyframes
                .find_nearest_keyframe(key, target.unwrap_or(u64::MAX), signal)
                .await
                .map_err(|e| wrap_store_error(key, e))?;

            if let Some(keyframe) = keyframe {
                return Ok(Base {
                    document: keyframe.document,
                    revision: keyframe.revision,
                    source: BaseSource::Keyframe,
                    module: None,
                });
            }
        }

        self.created_base(key, signal).await
    }

    /// Create the document from the first operation of its document scope.
    async fn created_base(
        &self,
        key: &StreamKey,
        signal: Option<&AbortSignal>,
    ) -> DocStateResult<Base> {
        check_aborted(signal)?;
        let document_key = key.document_scope();
        let page = self
            .operations
            .get_since(&document_key, None, PagingOptions::first(1), signal)
            .await
            .map_err(|e| wrap_store_error(&document_key, e))?;

        let Some(first) = page.results.into_iter().next() else {
            return Err(DocStateError::NoOperations {
                document_id: key.document_id.clone(),
                scope: key.scope.clone(),
                branch: key.branch.clone(),
            });
        };
        let create = first.operation;

        if create.action.action_type != CREATE_DOCUMENT {
            return Err(invalid_history(
                key,
                format!(
                    "first operation in document scope must be {CREATE_DOCUMENT}, found {}",
                    create.action.action_type
                ),
            ));
        }

        let input: CreateDocumentInput = serde_json::from_value(create.action.input.clone())
            .map_err(|e| invalid_history(key, format!("malformed {CREATE_DOCUMENT} input: {e}")))?;
        if input.model.is_empty() {
            return Err(invalid_history(
                key,
                format!("{CREATE_DOCUMENT} action missing model in input"),
            ));
        }

        let module = self.registry.get_module(&input.model)?;
        let mut document = module.create_document(&input, create.timestamp_utc_ms);
        document.set_revision(DOCUMENT_SCOPE, create.index);

        if key.scope != DOCUMENT_SCOPE {
            // Upgrades and deletion live in the document scope
            let replay = self
                .replay(
                    &document_key,
                    &module,
                    Replay::from(document),
                    create.index,
                    None,
                    signal,
                )
                .await?;
            document = replay.document;
            if let Some(index) = replay.last_index {
                document.set_revision(DOCUMENT_SCOPE, index);
            }
        }

        Ok(Base {
            document,
            revision: if key.scope == DOCUMENT_SCOPE { create.index } else { 0 },
            source: BaseSource::Empty,
            module: Some(module),
        })
    }

    /// Page through `key` after `since`, applying operations up to `target`.
    async fn replay(
        &self,
        key: &StreamKey,
        module: &DocumentModule,
        mut replay: Replay,
        since: u64,
        target: Option<u64>,
        signal: Option<&AbortSignal>,
    ) -> DocStateResult<Replay> {
        if target.is_some_and(|t| t <= since) {
            return Ok(replay);
        }

        let mut cursor: Option<String> = None;
        loop {
            check_aborted(signal)?;

            let paging = PagingOptions {
                cursor: cursor.take(),
                limit: self.page_size,
            };
            let page = self
                .operations
                .get_since(key, Some(since), paging, signal)
                .await
                .map_err(|e| wrap_store_error(key, e))?;

            let mut reached_target = false;
            for op in page.results {
                let operation = op.operation;
                if target.is_some_and(|t| operation.index > t) {
                    reached_target = true;
                    break;
                }

                let expected_after = replay.last_index.unwrap_or(since);
                if operation.index <= expected_after {
                    return Err(wrap_store_error(
                        key,
                        StoreError::OutOfOrder {
                            expected_after,
                            found: operation.index,
                        },
                    ));
                }

                replay.document = apply_operation(module, replay.document, &operation)?;
                replay.last_index = Some(operation.index);
                replay.last_timestamp_ms = Some(operation.timestamp_utc_ms);
                replay.applied += 1;

                if target == Some(operation.index) {
                    reached_target = true;
                    break;
                }
            }

            match page.next_cursor {
                Some(next) if !reached_target => cursor = Some(next),
                _ => return Ok(replay),
            }
        }
    }
}

impl From<Document> for Replay {
    fn from(document: Document) -> Self {
        Self {
            document,
            last_index: None,
            last_timestamp_ms: None,
            applied: 0,
        }
    }
}

/// Apply one operation, handling document-level actions without the reducer.
fn apply_operation(
    module: &DocumentModule,
    mut document: Document,
    operation: &Operation,
) -> DocStateResult<Document> {
    match operation.action.action_type.as_str() {
        CREATE_DOCUMENT => Ok(document),
        UPGRADE_DOCUMENT => {
            let input: UpgradeDocumentInput = serde_json::from_value(operation.action.input.clone())
                .map_err(|e| DocStateError::InvalidHistory {
                    document_id: document.id().to_string(),
                    reason: format!("malformed {UPGRADE_DOCUMENT} input: {e}"),
                })?;
            document.header.version = input.to_version;
            Ok(document)
        }
        DELETE_DOCUMENT => {
            document.header.is_deleted = true;
            Ok(document)
        }
        _ => Ok(module.reduce(document, &operation.action)?),
    }
}

fn wrap_store_error(key: &StreamKey, source: StoreError) -> DocStateError {
    match source {
        StoreError::Aborted => DocStateError::Aborted,
        source => DocStateError::Rebuild {
            document_id: key.document_id.clone(),
            scope: key.scope.clone(),
            branch: key.branch.clone(),
            source,
        },
    }
}

fn invalid_history(key: &StreamKey, reason: String) -> DocStateError {
    DocStateError::InvalidHistory {
        document_id: key.document_id.clone(),
        reason,
    }
}
