//! Best-effort keyframe persistence.
//!
//! Writes are spawned onto the current tokio runtime and never report back to
//! the caller. Failures are logged and counted in [`CacheStats`].

use super::keyframe_policy::PersistReason;
use super::stats::CacheStats;
use docstate_core::{Document, KeyframeStore, StreamKey};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinSet;

/// A keyframe queued for persistence.
#[derive(Debug, Clone)]
pub struct PendingKeyframe {
    pub key: StreamKey,
    pub revision: u64,
    pub document: Arc<Document>,
    pub reason: PersistReason,
}

/// Fire-and-forget keyframe writer.
pub struct KeyframeWriter<K: KeyframeStore + 'static> {
    store: Arc<K>,
    pending: Mutex<JoinSet<()>>,
    stats: Arc<CacheStats>,
}

impl<K: KeyframeStore + 'static> KeyframeWriter<K> {
    pub fn new(store: Arc<K>, stats: Arc<CacheStats>) -> Self {
        Self {
            store,
            pending: Mutex::new(JoinSet::new()),
            stats,
        }
    }

    pub fn store(&self) -> &Arc<K> {
        &self.store
    }

    fn pending(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Spawn a keyframe write. Returns immediately.
    ///
    /// Without a tokio runtime the write is skipped with a warning.
    pub fn persist(&self, keyframe: PendingKeyframe) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(
                    document_id = %keyframe.key.document_id,
                    scope = %keyframe.key.scope,
                    branch = %keyframe.key.branch,
                    revision = keyframe.revision,
                    reason = %keyframe.reason,
                    "No async runtime available, skipping keyframe"
                );
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);

        let mut pending = self.pending();
        // Reap finished writes so the set only holds in-flight ones
        while pending.try_join_next().is_some() {}
        pending.spawn_on(
            async move {
                let PendingKeyframe {
                    key,
                    revision,
                    document,
                    reason,
                } = keyframe;

                match store.put_keyframe(&key, revision, &document).await {
                    Ok(()) => {
                        stats.record_keyframe_persisted();
                        tracing::debug!(
                            document_id = %key.document_id,
                            scope = %key.scope,
                            branch = %key.branch,
                            revision,
                            reason = %reason,
                            "Persisted keyframe"
                        );
                    }
                    Err(e) => {
                        stats.record_keyframe_failure();
                        tracing::warn!(
                            error = %e,
                            document_id = %key.document_id,
                            scope = %key.scope,
                            branch = %key.branch,
                            revision,
                            reason = %reason,
                            "Failed to persist keyframe"
                        );
                    }
                }
            },
            &handle,
        );
    }

    /// Number of writes spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.pending().len()
    }

    /// Wait for every spawned write, including ones spawned while waiting.
    pub async fn flush(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.pending());
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Keyframe write task failed");
                }
            }
        }
    }
}
