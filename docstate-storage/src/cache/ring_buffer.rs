//! Bounded per-stream revision history.

use docstate_core::Document;
use std::collections::VecDeque;
use std::sync::Arc;

/// A document snapshot at a revision.
///
/// The document is shared; callers deep-copy it outside the cache lock.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub revision: u64,
    pub document: Arc<Document>,
}

/// Result of a [`RingBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// New newest entry; the oldest may have been dropped to make room.
    Appended,
    /// Same revision as the newest entry; its document was replaced.
    Coalesced,
    /// Older than the newest entry; nothing changed.
    Rejected { newest: u64 },
}

/// Fixed-capacity history of snapshots, ascending by revision.
///
/// Revisions are unique. When full, the oldest entry is dropped, never the newest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    capacity: usize,
    entries: VecDeque<CachedSnapshot>,
}

impl RingBuffer {
    /// Create an empty buffer. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, revision: u64, document: Document) -> PushOutcome {
        match self.entries.back_mut() {
            Some(newest) if revision < newest.revision => {
                return PushOutcome::Rejected {
                    newest: newest.revision,
                };
            }
            Some(newest) if revision == newest.revision => {
                newest.document = Arc::new(document);
                return PushOutcome::Coalesced;
            }
            _ => {}
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(CachedSnapshot {
            revision,
            document: Arc::new(document),
        });
        PushOutcome::Appended
    }

    /// Entries oldest to newest.
    pub fn get_all(&self) -> impl Iterator<Item = &CachedSnapshot> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&CachedSnapshot> {
        self.entries.back()
    }

    pub fn find(&self, revision: u64) -> Option<&CachedSnapshot> {
        self.entries
            .binary_search_by_key(&revision, |s| s.revision)
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    /// Entry with the greatest revision `<= target`.
    pub fn find_nearest_at_or_below(&self, target: u64) -> Option<&CachedSnapshot> {
        let idx = self.entries.partition_point(|s| s.revision <= target);
        idx.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn revisions(&self) -> Vec<u64> {
        self.entries.iter().map(|s| s.revision).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Consume the buffer, keeping only the newest entry.
    pub fn into_newest(mut self) -> Option<CachedSnapshot> {
        self.entries.pop_back()
    }
}
