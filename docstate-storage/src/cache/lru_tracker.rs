//! Recency tracking for cached streams.

use lru::LruCache;
use std::hash::Hash;

/// Tracks stream recency and reports which key to evict past capacity.
///
/// Holds keys only; the streams themselves live in the write cache.
#[derive(Debug)]
pub struct LruTracker<K: Hash + Eq> {
    order: LruCache<K, ()>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone> LruTracker<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: LruCache::unbounded(),
            capacity,
        }
    }

    /// Mark `key` most recently used, tracking it if new.
    pub fn touch(&mut self, key: K) {
        self.order.put(key, ());
    }

    /// Pop the least recently touched key if more than `capacity` are tracked.
    pub fn evict_if_over_capacity(&mut self) -> Option<K> {
        if self.order.len() > self.capacity {
            self.order.pop_lru().map(|(key, ())| key)
        } else {
            None
        }
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.order.pop(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.order.contains(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.order.iter().map(|(key, _)| key.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evicts_least_recently_touched() {
        let mut lru = LruTracker::new(2);
        lru.touch("a");
        lru.touch("b");
        lru.touch("a");
        lru.touch("c");

        assert_eq!(lru.evict_if_over_capacity(), Some("b"));
        assert_eq!(lru.evict_if_over_capacity(), None);
        assert_eq!(lru.keys_by_recency(), vec!["c", "a"]);
    }

    #[test]
    fn test_touch_existing_does_not_grow() {
        let mut lru = LruTracker::new(2);
        lru.touch("a");
        lru.touch("a");
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.evict_if_over_capacity(), None);
    }

    #[test]
    fn test_remove() {
        let mut lru = LruTracker::new(2);
        lru.touch("a");
        assert!(lru.remove(&"a"));
        assert!(!lru.remove(&"a"));
        assert!(!lru.contains(&"a"));
        assert!(lru.is_empty());
    }

    proptest! {
        #[test]
        fn prop_evicts_exactly_the_least_recent(
            touches in prop::collection::vec(0u8..20, 1..200),
            capacity in 1usize..8,
        ) {
            let mut lru = LruTracker::new(capacity);
            // Reference model: least recent first
            let mut model: Vec<u8> = Vec::new();
            for key in touches {
                lru.touch(key);
                model.retain(|k| *k != key);
                model.push(key);

                let expected = if model.len() > capacity {
                    Some(model.remove(0))
                } else {
                    None
                };
                prop_assert_eq!(lru.evict_if_over_capacity(), expected);
                prop_assert!(lru.len() <= capacity);
            }
        }
    }
}
