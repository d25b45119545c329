use docstate_core::{KeyframeStore, OperationStore};
use docstate_storage::{InMemoryModuleRegistry, InMemoryOperationStore, WriteCache};
use docstate_test_utils::{
    counter_document, counter_module, create_document_operation, failing, increments,
    AbortController, CacheConfig, DocStateError, FaultyOperationStore, ManualClock,
    RecordingKeyframeStore, StoreError, StreamKey, COUNTER_TYPE, DOCUMENT_SCOPE, GLOBAL_SCOPE,
    MAIN_BRANCH,
};
use std::sync::Arc;
use std::time::Duration;

type Operations = FaultyOperationStore<InMemoryOperationStore>;
type Cache = WriteCache<Operations, RecordingKeyframeStore, InMemoryModuleRegistry>;

struct Harness {
    cache: Cache,
    operations: Arc<Operations>,
    keyframes: Arc<RecordingKeyframeStore>,
    clock: Arc<ManualClock>,
}

fn harness(config: CacheConfig) -> Harness {
    let operations = Arc::new(FaultyOperationStore::new(InMemoryOperationStore::new()));
    let keyframes = Arc::new(RecordingKeyframeStore::new());
    let registry = Arc::new(InMemoryModuleRegistry::with_modules([counter_module()]));
    let clock = Arc::new(ManualClock::new(0));

    let cache = WriteCache::new(
        Arc::clone(&operations),
        Arc::clone(&keyframes),
        registry,
        config,
    )
    .expect("valid config")
    .with_clock(clock.clone());

    Harness {
        cache,
        operations,
        keyframes,
        clock,
    }
}

fn global(document_id: &str) -> StreamKey {
    StreamKey::new(document_id, GLOBAL_SCOPE, MAIN_BRANCH)
}

/// Create `document_id` and append `ops` increments to its global scope.
async fn seed(operations: &Operations, document_id: &str, ops: u64) {
    let key = global(document_id);
    operations
        .apply(
            &key.document_scope(),
            COUNTER_TYPE,
            vec![create_document_operation(document_id, COUNTER_TYPE)],
        )
        .await
        .unwrap();
    if ops > 0 {
        operations
            .apply(&key, COUNTER_TYPE, increments(1..=ops))
            .await
            .unwrap();
    }
}

fn put(cache: &Cache, document_id: &str, revision: u64) {
    cache.put_state(
        document_id,
        GLOBAL_SCOPE,
        MAIN_BRANCH,
        revision,
        &counter_document(document_id, revision as i64, revision),
    );
}

// ============================================================================
// RING BUFFER AND LRU
// ============================================================================

#[tokio::test]
async fn ring_buffer_keeps_newest_revisions() {
    let h = harness(CacheConfig::default().with_ring_buffer_size(5));

    for rev in 1..=12 {
        put(&h.cache, "doc1", rev);
    }

    let stream = h.cache.get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH).unwrap();
    assert_eq!(stream.len(), 5);
    assert_eq!(stream.revisions(), vec![8, 9, 10, 11, 12]);
}

#[tokio::test]
async fn fourth_document_evicts_first() {
    let h = harness(
        CacheConfig::default()
            .with_max_documents(3)
            .with_ring_buffer_size(5),
    );

    for id in ["d1", "d2", "d3", "d4"] {
        put(&h.cache, id, 1);
    }

    assert!(h.cache.get_stream("d1", GLOBAL_SCOPE, MAIN_BRANCH).is_none());
    assert_eq!(h.cache.len(), 3);
    assert_eq!(h.cache.invalidate("d1", None, None), 0);
    assert_eq!(h.cache.stats().evictions, 1);
}

#[tokio::test]
async fn read_hit_refreshes_recency() {
    let h = harness(CacheConfig::default().with_max_documents(3));

    for id in ["d1", "d2", "d3"] {
        put(&h.cache, id, 1);
    }
    h.cache
        .get_state("d1", GLOBAL_SCOPE, MAIN_BRANCH, Some(1), None)
        .await
        .unwrap();
    put(&h.cache, "d4", 1);

    assert!(h.cache.get_stream("d1", GLOBAL_SCOPE, MAIN_BRANCH).is_some());
    assert!(h.cache.get_stream("d2", GLOBAL_SCOPE, MAIN_BRANCH).is_none());
}

#[tokio::test]
async fn capacity_counts_streams_not_documents() {
    let h = harness(CacheConfig::default().with_max_documents(2));
    let doc = counter_document("doc1", 1, 1);

    h.cache.put_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, 1, &doc);
    h.cache.put_state("doc1", GLOBAL_SCOPE, "feature", 1, &doc);
    h.cache.put_state("doc1", DOCUMENT_SCOPE, MAIN_BRANCH, 1, &doc);

    assert_eq!(h.cache.len(), 2);
    assert!(h.cache.get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH).is_none());
}

// ============================================================================
// HITS
// ============================================================================

#[tokio::test]
async fn hit_is_deep_equal_but_independent() {
    let h = harness(CacheConfig::default());
    let original = counter_document("doc1", 7, 7);
    h.cache.put_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, 7, &original);

    let mut read = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, Some(7), None)
        .await
        .unwrap();
    assert_eq!(read, original);

    read.state["count"] = serde_json::json!(-1);
    let again = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, Some(7), None)
        .await
        .unwrap();
    assert_eq!(again, original);
    assert_eq!(h.operations.read_count(), 0);
}

// ============================================================================
// FAILURES LEAVE THE CACHE UNTOUCHED
// ============================================================================

#[tokio::test]
async fn unknown_model_creates_no_stream() {
    let h = harness(CacheConfig::default());
    h.operations
        .apply(
            &global("doc1").document_scope(),
            "unknown/type",
            vec![create_document_operation("doc1", "unknown/type")],
        )
        .await
        .unwrap();

    let err = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .unwrap_err();

    assert!(err.is_module_not_found());
    assert!(h.cache.get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH).is_none());
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn reducer_error_creates_no_stream() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 2).await;
    h.operations
        .apply(
            &global("doc1"),
            COUNTER_TYPE,
            vec![failing(3, "Custom reducer error with details")],
        )
        .await
        .unwrap();

    let err = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, Some(3), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocStateError::Reducer(_)));
    assert_eq!(err.to_string(), "Custom reducer error with details");
    assert!(h.cache.get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH).is_none());
}

#[tokio::test]
async fn store_error_is_wrapped_and_creates_no_stream() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 5).await;
    h.operations.fail_from_call(
        1,
        StoreError::Database {
            reason: "Database connection failed".to_string(),
        },
    );

    let err = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to rebuild document doc1"));
    assert!(err.to_string().contains("Database connection failed"));
    assert!(h.cache.get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH).is_none());
}

#[tokio::test]
async fn missing_history_is_no_operations() {
    let h = harness(CacheConfig::default());

    let err = h
        .cache
        .get_state("ghost", GLOBAL_SCOPE, MAIN_BRANCH, Some(1), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocStateError::NoOperations { .. }));
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn aborted_signal_is_rejected_up_front() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 5).await;
    let controller = AbortController::new();
    controller.abort();

    let signal = controller.signal();
    let err = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, Some(&signal))
        .await
        .unwrap_err();

    assert!(err.is_aborted());
    assert_eq!(h.operations.read_count(), 0);
    assert_eq!(h.keyframes.find_calls(), 0);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn failed_warm_miss_keeps_stream_and_recency() {
    let h = harness(CacheConfig::default().with_max_documents(2));
    seed(&h.operations, "d1", 5).await;
    h.operations
        .apply(&global("d1"), COUNTER_TYPE, vec![failing(6, "boom")])
        .await
        .unwrap();

    put(&h.cache, "d1", 5);
    put(&h.cache, "d2", 1);
    let before = h.cache.get_stream("d1", GLOBAL_SCOPE, MAIN_BRANCH).unwrap();

    let err = h
        .cache
        .get_state("d1", GLOBAL_SCOPE, MAIN_BRANCH, Some(6), None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(
        h.cache.get_stream("d1", GLOBAL_SCOPE, MAIN_BRANCH).unwrap(),
        before
    );

    // d1 is still least recently used
    put(&h.cache, "d3", 1);
    assert!(h.cache.get_stream("d1", GLOBAL_SCOPE, MAIN_BRANCH).is_none());
    assert!(h.cache.get_stream("d2", GLOBAL_SCOPE, MAIN_BRANCH).is_some());
}

#[tokio::test]
async fn keyframe_lookup_failure_is_not_downgraded() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 5).await;
    h.keyframes.fail_finds_with(StoreError::Database {
        reason: "keyframe table missing".to_string(),
    });

    let err = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocStateError::Rebuild { .. }));
    assert_eq!(h.operations.read_count(), 0);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn abort_during_paging_leaves_no_trace() {
    let h = harness(CacheConfig::default().with_rebuild_page_size(5));
    seed(&h.operations, "doc1", 30).await;
    let controller = Arc::new(AbortController::new());
    // Create lookup, document scope replay, then the first global page
    h.operations.abort_after_call(3, Arc::clone(&controller));

    let signal = controller.signal();
    let err = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, Some(&signal))
        .await
        .unwrap_err();
    h.cache.flush_keyframes().await;

    assert!(err.is_aborted());
    assert_eq!(h.operations.read_count(), 3);
    assert!(h.cache.is_empty());
    assert_eq!(h.keyframes.put_count(), 0);
}

#[tokio::test]
async fn retry_after_transient_failure_succeeds() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 5).await;
    h.operations.fail_from_call(
        1,
        StoreError::Database {
            reason: "connection reset".to_string(),
        },
    );

    assert!(h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .is_err());

    h.operations.heal();
    let doc = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .unwrap();

    assert_eq!(doc.state["count"], 5);
    assert_eq!(
        h.cache
            .get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH)
            .unwrap()
            .revisions(),
        vec![5]
    );
    let stats = h.cache.stats();
    assert_eq!(stats.rebuild_failures, 1);
    assert_eq!(stats.cold_misses, 2);
}

// ============================================================================
// REBUILD BASES
// ============================================================================

#[tokio::test]
async fn cold_miss_starts_from_keyframe() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 20).await;
    h.keyframes
        .seed(global("doc1"), 15, counter_document("doc1", 15, 15));
    // Nothing below the keyframe is readable any more
    h.operations
        .inner()
        .truncate_through(&global("doc1"), 15)
        .unwrap();

    let doc = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .unwrap();

    assert_eq!(doc.state["count"], 20);
    assert_eq!(doc.revision(GLOBAL_SCOPE), 20);
    let reads = h.operations.reads_for_scope(GLOBAL_SCOPE);
    assert_eq!(reads[0].since, Some(15));
    assert!(h.operations.reads_for_scope(DOCUMENT_SCOPE).is_empty());
}

#[tokio::test]
async fn warm_miss_starts_from_cached_snapshot() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 15).await;
    put(&h.cache, "doc1", 10);
    h.operations
        .inner()
        .truncate_through(&global("doc1"), 10)
        .unwrap();

    let doc = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, Some(13), None)
        .await
        .unwrap();

    assert_eq!(doc.state["count"], 13);
    assert_eq!(h.keyframes.find_calls(), 0);
    assert_eq!(h.operations.reads_for_scope(GLOBAL_SCOPE)[0].since, Some(10));
    assert_eq!(h.cache.stats().warm_misses, 1);
}

#[tokio::test]
async fn target_past_log_end_caches_last_logged_revision() {
    let h = harness(CacheConfig::default());
    seed(&h.operations, "doc1", 3).await;

    let doc = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, Some(9), None)
        .await
        .unwrap();
    assert_eq!(doc.state["count"], 3);
    assert_eq!(doc.revision(GLOBAL_SCOPE), 3);
    assert_eq!(
        h.cache
            .get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH)
            .unwrap()
            .revisions(),
        vec![3]
    );

    // The next real write is still accepted
    h.operations
        .apply(&global("doc1"), COUNTER_TYPE, increments(4..=4))
        .await
        .unwrap();
    put(&h.cache, "doc1", 4);

    let latest = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .unwrap();
    assert_eq!(latest.state["count"], 4);
    assert_eq!(latest.revision(GLOBAL_SCOPE), 4);
    assert_eq!(
        h.cache
            .get_stream("doc1", GLOBAL_SCOPE, MAIN_BRANCH)
            .unwrap()
            .revisions(),
        vec![3, 4]
    );
}

#[tokio::test]
async fn rebuilt_document_goes_through_policy() {
    let h = harness(CacheConfig::default().with_cold_keyframe_interval(10));
    seed(&h.operations, "doc1", 12).await;

    h.cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, None, None)
        .await
        .unwrap();
    h.cache.flush_keyframes().await;

    assert_eq!(h.keyframes.put_revisions(&global("doc1")), vec![12]);
}

// ============================================================================
// KEYFRAME POLICY
// ============================================================================

fn policy_config() -> CacheConfig {
    CacheConfig::default()
        .with_hot_threshold(Duration::from_millis(100))
        .with_cold_keyframe_interval(5)
        .with_hot_keyframe_interval(50)
}

#[tokio::test]
async fn cold_writes_persist_at_interval() {
    let h = harness(policy_config());

    for rev in 1..=4 {
        put(&h.cache, "doc1", rev);
        h.clock.advance(Duration::from_millis(200));
    }
    h.cache.flush_keyframes().await;
    assert_eq!(h.keyframes.put_count(), 0);

    put(&h.cache, "doc1", 5);
    h.cache.flush_keyframes().await;

    let puts = h.keyframes.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].revision, 5);
    assert_eq!(puts[0].document, counter_document("doc1", 5, 5));
}

#[tokio::test]
async fn hot_to_cold_forces_keyframe() {
    let h = harness(policy_config());

    put(&h.cache, "doc1", 1);
    h.clock.advance(Duration::from_millis(10));
    put(&h.cache, "doc1", 2);
    h.clock.advance(Duration::from_millis(150));
    put(&h.cache, "doc1", 3);
    h.cache.flush_keyframes().await;

    assert_eq!(h.keyframes.put_revisions(&global("doc1")), vec![3]);
}

#[tokio::test]
async fn eviction_persists_newest_snapshot_once() {
    let h = harness(CacheConfig::default().with_max_documents(2));

    for rev in 1..=3 {
        put(&h.cache, "d1", rev);
    }
    put(&h.cache, "d2", 1);
    put(&h.cache, "d3", 1);
    h.cache.flush_keyframes().await;

    assert_eq!(h.keyframes.put_revisions(&global("d1")), vec![3]);
    assert_eq!(h.keyframes.put_count(), 1);

    put(&h.cache, "d4", 1);
    h.cache.flush_keyframes().await;
    assert_eq!(h.keyframes.put_revisions(&global("d1")), vec![3]);
    assert_eq!(h.keyframes.put_revisions(&global("d2")), vec![1]);
}

#[tokio::test]
async fn recreated_stream_forgets_write_rate() {
    let h = harness(policy_config().with_max_documents(1));

    put(&h.cache, "d1", 1);
    h.clock.advance(Duration::from_millis(10));
    put(&h.cache, "d1", 2);
    put(&h.cache, "d2", 1);
    put(&h.cache, "d1", 3);

    let stream = h.cache.get_stream("d1", GLOBAL_SCOPE, MAIN_BRANCH).unwrap();
    assert!(!stream.write_rate.was_hot);
    assert_eq!(stream.revisions(), vec![3]);
}

#[tokio::test]
async fn keyframe_failures_do_not_affect_cache() {
    let h = harness(policy_config());
    h.keyframes.set_fail_puts(true);

    for rev in 1..=5 {
        put(&h.cache, "doc1", rev);
        h.clock.advance(Duration::from_millis(200));
    }
    h.cache.flush_keyframes().await;

    assert_eq!(h.keyframes.put_count(), 1);
    assert_eq!(h.cache.stats().keyframe_failures, 1);
    let doc = h
        .cache
        .get_state("doc1", GLOBAL_SCOPE, MAIN_BRANCH, Some(5), None)
        .await
        .unwrap();
    assert_eq!(doc.state["count"], 5);
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn shutdown_attempts_every_stream_despite_failures() {
    let h = harness(CacheConfig::default());
    h.cache.startup().await;
    for id in ["d1", "d2", "d3"] {
        put(&h.cache, id, 1);
        put(&h.cache, id, 2);
    }
    h.keyframes.set_fail_puts(true);

    h.cache.shutdown().await;

    assert_eq!(h.keyframes.put_count(), 3);
    for id in ["d1", "d2", "d3"] {
        assert_eq!(h.keyframes.put_revisions(&global(id)), vec![2]);
    }
    assert_eq!(h.cache.stats().keyframe_failures, 3);
}

#[tokio::test]
async fn purge_removes_stream_and_keyframes() {
    let h = harness(CacheConfig::default());
    h.keyframes
        .put_keyframe(&global("doc1"), 4, &counter_document("doc1", 4, 4))
        .await
        .unwrap();
    put(&h.cache, "doc1", 5);

    let deleted = h.cache.purge("doc1", GLOBAL_SCOPE, MAIN_BRANCH).await.unwrap();

    assert_eq!(deleted, 1);
    assert!(h.cache.is_empty());
}
