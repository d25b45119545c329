//! Write cache façade.
//!
//! Serves document snapshots per stream from a ring buffer, rebuilds on miss,
//! and persists keyframes in the background according to [`KeyframePolicy`].
//! All cache state sits behind one mutex that is never held across an await;
//! a rebuild reads its base, releases the lock for I/O, and commits at the end.

use super::keyframe_policy::{KeyframeDecision, KeyframePolicy, PersistReason, WriteRateState};
use super::lru_tracker::LruTracker;
use super::persist::{KeyframeWriter, PendingKeyframe};
use super::rebuild::RebuildEngine;
use super::ring_buffer::{CachedSnapshot, PushOutcome, RingBuffer};
use super::stats::{CacheStats, CacheStatsSnapshot};
use docstate_core::{
    check_aborted, AbortSignal, CacheConfig, Clock, DocStateError, DocStateResult, Document,
    DocumentModelRegistry, KeyframeStore, OperationStore, StreamKey, SystemClock,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cached state of one stream.
#[derive(Debug)]
struct StreamRecord {
    ring_buffer: RingBuffer,
    write_rate: WriteRateState,
}

impl StreamRecord {
    fn new(ring_buffer_size: usize, baseline: u64) -> Self {
        Self {
            ring_buffer: RingBuffer::new(ring_buffer_size),
            write_rate: WriteRateState::from_baseline(baseline),
        }
    }
}

#[derive(Debug)]
struct CacheState {
    streams: HashMap<StreamKey, StreamRecord>,
    lru: LruTracker<StreamKey>,
}

/// Read-only view of a cached stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSnapshot {
    pub key: StreamKey,
    /// Ring buffer contents, oldest to newest.
    pub entries: Vec<CachedSnapshot>,
    pub capacity: usize,
    pub write_rate: WriteRateState,
}

impl StreamSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revisions(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.revision).collect()
    }

    pub fn newest(&self) -> Option<&CachedSnapshot> {
        self.entries.last()
    }
}

enum Lookup {
    Hit(Arc<Document>),
    Warm(CachedSnapshot),
    Cold,
}

/// In-memory document-state cache with keyframe persistence.
pub struct WriteCache<O, K, R>
where
    K: KeyframeStore + 'static,
{
    config: CacheConfig,
    state: Mutex<CacheState>,
    policy: KeyframePolicy,
    rebuild: RebuildEngine<O, K, R>,
    writer: KeyframeWriter<K>,
    clock: Arc<dyn Clock>,
    stats: Arc<CacheStats>,
}

impl<O, K, R> WriteCache<O, K, R>
where
    O: OperationStore,
    K: KeyframeStore + 'static,
    R: DocumentModelRegistry,
{
    /// Create a cache over the given collaborators.
    ///
    /// Fails with [`DocStateError::Config`] if `config` does not validate.
    pub fn new(
        operations: Arc<O>,
        keyframes: Arc<K>,
        registry: Arc<R>,
        config: CacheConfig,
    ) -> DocStateResult<Self> {
        config.validate()?;

        let stats = Arc::new(CacheStats::new());
        Ok(Self {
            state: Mutex::new(CacheState {
                streams: HashMap::new(),
                lru: LruTracker::new(config.max_documents),
            }),
            policy: KeyframePolicy::from_config(&config),
            rebuild: RebuildEngine::new(
                operations,
                Arc::clone(&keyframes),
                registry,
                config.rebuild_page_size,
            ),
            writer: KeyframeWriter::new(keyframes, Arc::clone(&stats)),
            clock: Arc::new(SystemClock),
            stats,
            config,
        })
    }

    /// Replace the clock used for hot/cold classification.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub async fn startup(&self) {
        tracing::info!(
            max_documents = self.config.max_documents,
            ring_buffer_size = self.config.ring_buffer_size,
            "Write cache started"
        );
    }

    /// Persist the newest snapshot of every cached stream and wait for all
    /// keyframe writes. Individual write failures are logged, not returned.
    pub async fn shutdown(&self) {
        let pending: Vec<PendingKeyframe> = {
            let state = self.lock();
            state
                .streams
                .iter()
                .filter_map(|(key, record)| {
                    record.ring_buffer.newest().map(|newest| PendingKeyframe {
                        key: key.clone(),
                        revision: newest.revision,
                        document: Arc::clone(&newest.document),
                        reason: PersistReason::Shutdown,
                    })
                })
                .collect()
        };

        let streams = pending.len();
        for keyframe in pending {
            self.writer.persist(keyframe);
        }
        self.writer.flush().await;

        let stats = self.stats.snapshot();
        tracing::info!(
            streams,
            keyframes_persisted = stats.keyframes_persisted,
            keyframe_failures = stats.keyframe_failures,
            "Write cache shut down"
        );
    }

    /// Wait for in-flight keyframe writes.
    pub async fn flush_keyframes(&self) {
        self.writer.flush().await;
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Get a document at `target`, or at its newest revision when `None`.
    ///
    /// Served from the ring buffer on an exact hit, rebuilt otherwise. A failed
    /// or aborted call leaves the cache exactly as it found it.
    pub async fn get_state(
        &self,
        document_id: &str,
        scope: &str,
        branch: &str,
        target: Option<u64>,
        signal: Option<&AbortSignal>,
    ) -> DocStateResult<Document> {
        check_aborted(signal)?;
        let key = StreamKey::new(document_id, scope, branch);

        let base = match self.lookup(&key, target) {
            Lookup::Hit(document) => {
                self.stats.record_hit();
                return Ok(Document::clone(&document));
            }
            Lookup::Warm(base) => {
                self.stats.record_warm_miss();
                Some(base)
            }
            Lookup::Cold => {
                self.stats.record_cold_miss();
                None
            }
        };

        let outcome = match self.rebuild.rebuild(&key, target, base, signal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.record_rebuild_failure();
                tracing::debug!(
                    error = %e,
                    document_id,
                    scope,
                    branch,
                    target_revision = ?target,
                    "Rebuild failed"
                );
                return Err(e);
            }
        };

        // The signal may have fired during the last page
        check_aborted(signal)?;

        tracing::debug!(
            document_id,
            scope,
            branch,
            revision = outcome.revision,
            operations = outcome.operations_applied,
            base = ?outcome.base_source,
            "Rebuilt document"
        );

        let document = outcome.document.clone();
        self.commit(key, outcome.revision, outcome.document, outcome.baseline);
        Ok(document)
    }

    fn lookup(&self, key: &StreamKey, target: Option<u64>) -> Lookup {
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(record) = state.streams.get(key) else {
            return Lookup::Cold;
        };

        let exact = match target {
            None => record.ring_buffer.newest(),
            Some(revision) => record.ring_buffer.find(revision),
        };
        if let Some(snapshot) = exact {
            let document = Arc::clone(&snapshot.document);
            state.lru.touch(key.clone());
            return Lookup::Hit(document);
        }

        match target.and_then(|t| record.ring_buffer.find_nearest_at_or_below(t)) {
            Some(base) => Lookup::Warm(base.clone()),
            None => Lookup::Cold,
        }
    }

    /// Inspect a cached stream.
    pub fn get_stream(&self, document_id: &str, scope: &str, branch: &str) -> Option<StreamSnapshot> {
        let key = StreamKey::new(document_id, scope, branch);
        let state = self.lock();
        state.streams.get(&key).map(|record| StreamSnapshot {
            entries: record.ring_buffer.get_all().cloned().collect(),
            capacity: record.ring_buffer.capacity(),
            write_rate: record.write_rate.clone(),
            key,
        })
    }

    /// Number of cached streams.
    pub fn len(&self) -> usize {
        self.lock().streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().streams.is_empty()
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Cache a copy of `document` at `revision`.
    ///
    /// Never fails. Keyframe writes it triggers run in the background.
    pub fn put_state(
        &self,
        document_id: &str,
        scope: &str,
        branch: &str,
        revision: u64,
        document: &Document,
    ) {
        let key = StreamKey::new(document_id, scope, branch);
        self.commit(key, revision, document.clone(), 0);
    }

    /// Store a snapshot, evicting and keyframing as needed.
    fn commit(&self, key: StreamKey, revision: u64, document: Document, baseline: u64) {
        let now_ms = self.clock.now_ms();
        let mut to_persist = Vec::new();

        {
            let mut guard = self.lock();
            let state = &mut *guard;

            if !state.streams.contains_key(&key) {
                state.lru.touch(key.clone());
                if let Some(evicted) = state.lru.evict_if_over_capacity() {
                    if let Some(record) = state.streams.remove(&evicted) {
                        self.stats.record_eviction();
                        tracing::debug!(stream = %evicted, "Evicted stream");
                        if let Some(newest) = record.ring_buffer.into_newest() {
                            to_persist.push(PendingKeyframe {
                                key: evicted,
                                revision: newest.revision,
                                document: newest.document,
                                reason: PersistReason::Eviction,
                            });
                        }
                    }
                }
            }

            let record = state
                .streams
                .entry(key.clone())
                .or_insert_with(|| StreamRecord::new(self.config.ring_buffer_size, baseline));

            match record.ring_buffer.push(revision, document) {
                PushOutcome::Rejected { newest } => {
                    tracing::debug!(
                        stream = %key,
                        revision,
                        newest,
                        "Ignored snapshot older than newest cached revision"
                    );
                }
                PushOutcome::Appended | PushOutcome::Coalesced => {
                    let decision = self.policy.observe(&mut record.write_rate, revision, now_ms);
                    if let KeyframeDecision::Persist(reason) = decision {
                        if let Some(newest) = record.ring_buffer.newest() {
                            to_persist.push(PendingKeyframe {
                                key: key.clone(),
                                revision: newest.revision,
                                document: Arc::clone(&newest.document),
                                reason,
                            });
                        }
                    }
                }
            }

            state.lru.touch(key);
        }

        for keyframe in to_persist {
            self.writer.persist(keyframe);
        }
    }

    /// Drop cached streams of a document.
    ///
    /// `None` for `scope` or `branch` matches any value. Returns the number
    /// of streams removed. No keyframes are written.
    pub fn invalidate(&self, document_id: &str, scope: Option<&str>, branch: Option<&str>) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;

        let matching: Vec<StreamKey> = state
            .streams
            .keys()
            .filter(|key| key.matches(document_id, scope, branch))
            .cloned()
            .collect();

        for key in &matching {
            state.streams.remove(key);
            state.lru.remove(key);
        }

        if !matching.is_empty() {
            tracing::debug!(document_id, count = matching.len(), "Invalidated streams");
        }
        matching.len()
    }

    /// Drop every cached stream without writing keyframes.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.streams.clear();
        state.lru.clear();
    }

    /// Invalidate a stream and delete its persisted keyframes.
    ///
    /// Returns the number of keyframes deleted.
    pub async fn purge(&self, document_id: &str, scope: &str, branch: &str) -> DocStateResult<u64> {
        self.invalidate(document_id, Some(scope), Some(branch));
        // In-flight writes must land before the delete
        self.writer.flush().await;

        let key = StreamKey::new(document_id, scope, branch);
        self.writer
            .store()
            .delete_keyframes(&key)
            .await
            .map_err(DocStateError::Store)
    }
}
