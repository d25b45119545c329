//! Mock collaborators with call recording and fault injection.

use async_trait::async_trait;
use docstate_core::{
    AbortController, AbortSignal, Document, Keyframe, KeyframeStore, Operation, OperationPage,
    OperationStore, PagingOptions, StoreError, StreamKey,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// KEYFRAME STORE
// ============================================================================

/// Keyframe store that records every write.
///
/// Writes and lookups can be made to fail independently.
#[derive(Debug, Default)]
pub struct RecordingKeyframeStore {
    puts: Mutex<Vec<Keyframe>>,
    stored: Mutex<BTreeMap<StreamKey, BTreeMap<u64, Document>>>,
    fail_puts: AtomicBool,
    find_error: Mutex<Option<StoreError>>,
    find_calls: AtomicUsize,
}

impl RecordingKeyframeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `put_keyframe` call, including failed ones, in call order.
    pub fn puts(&self) -> Vec<Keyframe> {
        self.puts.lock().unwrap().clone()
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    /// Revisions written for one stream, in call order.
    pub fn put_revisions(&self, key: &StreamKey) -> Vec<u64> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .filter(|k| &k.key == key)
            .map(|k| k.revision)
            .collect()
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_finds_with(&self, error: StoreError) {
        *self.find_error.lock().unwrap() = Some(error);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Pre-populate a keyframe without recording it as a write.
    pub fn seed(&self, key: StreamKey, revision: u64, document: Document) {
        self.stored
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .insert(revision, document);
    }
}

#[async_trait]
impl KeyframeStore for RecordingKeyframeStore {
    async fn put_keyframe(
        &self,
        key: &StreamKey,
        revision: u64,
        document: &Document,
    ) -> Result<(), StoreError> {
        self.puts.lock().unwrap().push(Keyframe {
            key: key.clone(),
            revision,
            document: document.clone(),
        });

        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Database {
                reason: "keyframe write rejected".to_string(),
            });
        }

        self.seed(key.clone(), revision, document.clone());
        Ok(())
    }

    async fn find_nearest_keyframe(
        &self,
        key: &StreamKey,
        target_revision: u64,
        signal: Option<&AbortSignal>,
    ) -> Result<Option<Keyframe>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);

        if signal.is_some_and(AbortSignal::is_aborted) {
            return Err(StoreError::Aborted);
        }
        if let Some(err) = self.find_error.lock().unwrap().clone() {
            return Err(err);
        }

        let stored = self.stored.lock().unwrap();
        Ok(stored.get(key).and_then(|revisions| {
            revisions
                .range(..=target_revision)
                .next_back()
                .map(|(revision, document)| Keyframe {
                    key: key.clone(),
                    revision: *revision,
                    document: document.clone(),
                })
        }))
    }

    async fn delete_keyframes(&self, key: &StreamKey) -> Result<u64, StoreError> {
        let removed = self.stored.lock().unwrap().remove(key);
        Ok(removed.map_or(0, |revisions| revisions.len() as u64))
    }
}

// ============================================================================
// OPERATION STORE
// ============================================================================

/// A `get_since` request as seen by [`FaultyOperationStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRead {
    pub key: StreamKey,
    pub since: Option<u64>,
    pub cursor: Option<String>,
    pub limit: usize,
}

/// Wraps a real operation store, counting reads and injecting faults.
///
/// Call numbers are 1-based and count `get_since` calls only.
pub struct FaultyOperationStore<S> {
    inner: S,
    reads: Mutex<Vec<RecordedRead>>,
    fail_from_call: Mutex<Option<(usize, StoreError)>>,
    abort_after_call: Mutex<Option<(usize, Arc<AbortController>)>>,
    reverse_pages: AtomicBool,
}

impl<S: OperationStore> FaultyOperationStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
            fail_from_call: Mutex::new(None),
            abort_after_call: Mutex::new(None),
            reverse_pages: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail every read from call number `call` onwards.
    pub fn fail_from_call(&self, call: usize, error: StoreError) {
        *self.fail_from_call.lock().unwrap() = Some((call, error));
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        *self.fail_from_call.lock().unwrap() = None;
    }

    /// Fire `controller` right after read number `call` completes.
    pub fn abort_after_call(&self, call: usize, controller: Arc<AbortController>) {
        *self.abort_after_call.lock().unwrap() = Some((call, controller));
    }

    /// Return each page's results in descending order.
    pub fn set_reverse_pages(&self, reverse: bool) {
        self.reverse_pages.store(reverse, Ordering::SeqCst);
    }

    pub fn reads(&self) -> Vec<RecordedRead> {
        self.reads.lock().unwrap().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    /// Reads issued against one scope.
    pub fn reads_for_scope(&self, scope: &str) -> Vec<RecordedRead> {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.key.scope == scope)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl<S: OperationStore> OperationStore for FaultyOperationStore<S> {
    async fn apply(
        &self,
        key: &StreamKey,
        document_type: &str,
        operations: Vec<Operation>,
    ) -> Result<(), StoreError> {
        self.inner.apply(key, document_type, operations).await
    }

    async fn get_since(
        &self,
        key: &StreamKey,
        since: Option<u64>,
        paging: PagingOptions,
        signal: Option<&AbortSignal>,
    ) -> Result<OperationPage, StoreError> {
        let call = {
            let mut reads = self.reads.lock().unwrap();
            reads.push(RecordedRead {
                key: key.clone(),
                since,
                cursor: paging.cursor.clone(),
                limit: paging.limit,
            });
            reads.len()
        };

        let injected = self
            .fail_from_call
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(from, _)| call >= *from)
            .map(|(_, err)| err.clone());
        if let Some(err) = injected {
            return Err(err);
        }

        let mut page = self.inner.get_since(key, since, paging, signal).await?;
        if self.reverse_pages.load(Ordering::SeqCst) {
            page.results.reverse();
        }

        if let Some((at, controller)) = self.abort_after_call.lock().unwrap().as_ref() {
            if call == *at {
                controller.abort();
            }
        }

        Ok(page)
    }
}
