//! Adaptive keyframe persistence policy.
//!
//! Each write to a stream is classified hot or cold by the time since the
//! previous write. Hot streams are keyframed every `hot_keyframe_interval`
//! revisions and cold streams every `cold_keyframe_interval`. A stream that
//! goes from hot to cold is keyframed immediately.

use docstate_core::CacheConfig;
use std::fmt;

/// Why a keyframe is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistReason {
    HotToCold,
    HotInterval,
    ColdInterval,
    Eviction,
    Shutdown,
}

impl PersistReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistReason::HotToCold => "hot_to_cold",
            PersistReason::HotInterval => "hot_interval",
            PersistReason::ColdInterval => "cold_interval",
            PersistReason::Eviction => "eviction",
            PersistReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for PersistReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of observing one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyframeDecision {
    Skip,
    Persist(PersistReason),
}

/// Per-stream write-rate tracking.
///
/// Reset whenever a stream is (re)created, so no hot/cold memory survives eviction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteRateState {
    pub last_put_timestamp_ms: Option<i64>,
    pub was_hot: bool,
    /// Revision distance from the last keyframe known to this stream.
    pub revisions_since_keyframe: u64,
    /// Highest revision observed, used to accumulate deltas across gaps.
    pub last_revision: u64,
}

impl WriteRateState {
    /// Fresh tracking measured from `baseline`, the last revision known to be keyframed.
    pub fn from_baseline(baseline: u64) -> Self {
        Self {
            last_revision: baseline,
            ..Self::default()
        }
    }
}

/// Decides when the newest snapshot of a stream becomes a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyframePolicy {
    hot_threshold_ms: i64,
    hot_interval: u64,
    cold_interval: u64,
}

impl KeyframePolicy {
    pub fn new(hot_threshold_ms: i64, hot_interval: u64, cold_interval: u64) -> Self {
        Self {
            hot_threshold_ms,
            hot_interval,
            cold_interval,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.hot_threshold_ms(),
            config.hot_keyframe_interval,
            config.cold_keyframe_interval,
        )
    }

    /// Record a write of `revision` at `now_ms` and decide whether to keyframe.
    pub fn observe(&self, state: &mut WriteRateState, revision: u64, now_ms: i64) -> KeyframeDecision {
        let is_hot = state
            .last_put_timestamp_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.hot_threshold_ms);

        let delta = state
            .revisions_since_keyframe
            .saturating_add(revision.saturating_sub(state.last_revision));

        let decision = if state.was_hot && !is_hot {
            KeyframeDecision::Persist(PersistReason::HotToCold)
        } else if is_hot && delta >= self.hot_interval {
            KeyframeDecision::Persist(PersistReason::HotInterval)
        } else if !is_hot && delta >= self.cold_interval {
            KeyframeDecision::Persist(PersistReason::ColdInterval)
        } else {
            KeyframeDecision::Skip
        };

        state.revisions_since_keyframe = match decision {
            KeyframeDecision::Persist(_) => 0,
            KeyframeDecision::Skip => delta,
        };
        state.last_revision = state.last_revision.max(revision);
        state.was_hot = is_hot;
        state.last_put_timestamp_ms = Some(now_ms);

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> KeyframePolicy {
        KeyframePolicy::new(100, 20, 5)
    }

    #[test]
    fn test_cold_writes_persist_at_interval() {
        let policy = policy();
        let mut state = WriteRateState::default();

        for (i, rev) in (1..=4).enumerate() {
            let decision = policy.observe(&mut state, rev, i as i64 * 200);
            assert_eq!(decision, KeyframeDecision::Skip, "revision {rev}");
        }
        assert_eq!(state.revisions_since_keyframe, 4);

        let decision = policy.observe(&mut state, 5, 1_000);
        assert_eq!(decision, KeyframeDecision::Persist(PersistReason::ColdInterval));
        assert_eq!(state.revisions_since_keyframe, 0);
    }

    #[test]
    fn test_hot_to_cold_forces_persist() {
        let policy = policy();
        let mut state = WriteRateState::default();

        assert_eq!(policy.observe(&mut state, 1, 0), KeyframeDecision::Skip);
        assert_eq!(policy.observe(&mut state, 2, 10), KeyframeDecision::Skip);
        assert!(state.was_hot);

        let decision = policy.observe(&mut state, 3, 200);
        assert_eq!(decision, KeyframeDecision::Persist(PersistReason::HotToCold));
        assert!(!state.was_hot);
        assert_eq!(state.revisions_since_keyframe, 0);
    }

    #[test]
    fn test_cold_to_hot_never_forces() {
        let policy = KeyframePolicy::new(100, 1_000, 1_000);
        let mut state = WriteRateState::default();

        assert_eq!(policy.observe(&mut state, 1, 0), KeyframeDecision::Skip);
        assert_eq!(policy.observe(&mut state, 2, 500), KeyframeDecision::Skip);
        // Cold to hot
        assert_eq!(policy.observe(&mut state, 3, 510), KeyframeDecision::Skip);
        assert!(state.was_hot);
    }

    #[test]
    fn test_hot_interval_uses_hot_threshold() {
        let policy = KeyframePolicy::new(100, 3, 1_000);
        let mut state = WriteRateState::default();

        assert_eq!(policy.observe(&mut state, 1, 0), KeyframeDecision::Skip);
        assert_eq!(policy.observe(&mut state, 2, 1), KeyframeDecision::Skip);
        assert_eq!(
            policy.observe(&mut state, 3, 2),
            KeyframeDecision::Persist(PersistReason::HotInterval)
        );
        assert_eq!(policy.observe(&mut state, 4, 3), KeyframeDecision::Skip);
    }

    #[test]
    fn test_delta_counts_revision_gaps() {
        let policy = policy();
        let mut state = WriteRateState::default();

        assert_eq!(policy.observe(&mut state, 2, 0), KeyframeDecision::Skip);
        // Batched write jumps from 2 to 7
        assert_eq!(
            policy.observe(&mut state, 7, 500),
            KeyframeDecision::Persist(PersistReason::ColdInterval)
        );
    }

    #[test]
    fn test_baseline_measures_from_known_keyframe() {
        let policy = policy();
        let mut state = WriteRateState::from_baseline(40);

        assert_eq!(policy.observe(&mut state, 41, 0), KeyframeDecision::Skip);
        assert_eq!(state.revisions_since_keyframe, 1);
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(PersistReason::HotToCold.to_string(), "hot_to_cold");
        assert_eq!(PersistReason::Eviction.as_str(), "eviction");
    }
}
