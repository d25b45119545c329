//! Proptest generators.

use crate::fixtures::counter_document;
use docstate_core::{Document, StreamKey};
use proptest::prelude::*;

/// Stream keys over a small alphabet so collisions are common.
pub fn arb_stream_key() -> impl Strategy<Value = StreamKey> {
    (
        "doc[0-9]{1,2}",
        prop::sample::select(vec!["global", "local", "document"]),
        prop::sample::select(vec!["main", "feature"]),
    )
        .prop_map(|(id, scope, branch)| StreamKey::new(id, scope, branch))
}

/// Strictly increasing revisions starting above 0, with gaps of 1..=`max_gap`.
pub fn arb_revisions(max_len: usize, max_gap: u64) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1..=max_gap, 1..=max_len).prop_map(|gaps| {
        gaps.into_iter()
            .scan(0u64, |rev, gap| {
                *rev += gap;
                Some(*rev)
            })
            .collect()
    })
}

/// Counter documents at arbitrary counts and revisions.
pub fn arb_counter_document() -> impl Strategy<Value = Document> {
    ("doc[0-9]{1,2}", -1000i64..1000, 0u64..10_000)
        .prop_map(|(id, count, revision)| counter_document(&id, count, revision))
}
