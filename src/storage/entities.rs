use serde::Deserialize;
use tracing::{debug, warn};

use crate::tracker::state::TrackerState;

/// Every shape of the tracker blob that has been written by some release. Variants are tried
/// in order, the legacy one accepts any object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StoredTrackerState {
    Canonical(CanonicalStateEntity),
    Accumulated(AccumulatedStateEntity),
    Legacy(LegacyStateEntity),
}

/// Current shape. Numbers may be fractional and are floored like in the older shapes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalStateEntity {
    pub accumulated_seconds: f64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub resumed_at_ms: Option<f64>,
}

/// Shape with `accumulated` instead of `accumulatedSeconds` and `startTime` as the resume
/// timestamp.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedStateEntity {
    pub accumulated: f64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub start_time: Option<f64>,
}

/// Oldest shape. `pausedTime` carried separate pause bookkeeping that the current model
/// doesn't need.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyStateEntity {
    pub total_time: Option<f64>,
    pub is_active: bool,
    pub is_paused: bool,
    pub start_time: Option<f64>,
    pub paused_time: Option<f64>,
}

/// Values written by javascript releases may be fractional or negative.
fn whole_seconds(value: f64) -> u64 {
    if value.is_finite() && value > 0. {
        value.floor() as u64
    } else {
        0
    }
}

fn timestamp_ms(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.floor() as i64)
}

impl From<StoredTrackerState> for TrackerState {
    fn from(value: StoredTrackerState) -> Self {
        match value {
            StoredTrackerState::Canonical(CanonicalStateEntity {
                accumulated_seconds,
                is_active,
                is_paused,
                resumed_at_ms,
            }) => TrackerState {
                accumulated_seconds: whole_seconds(accumulated_seconds),
                is_active,
                is_paused,
                resumed_at_ms: resumed_at_ms.and_then(timestamp_ms),
            },
            StoredTrackerState::Accumulated(AccumulatedStateEntity {
                accumulated,
                is_active,
                is_paused,
                start_time,
            }) => TrackerState {
                accumulated_seconds: whole_seconds(accumulated),
                is_active,
                is_paused,
                resumed_at_ms: start_time.and_then(timestamp_ms),
            },
            StoredTrackerState::Legacy(LegacyStateEntity {
                total_time,
                is_active,
                is_paused,
                start_time,
                paused_time: _,
            }) => TrackerState {
                accumulated_seconds: total_time.map(whole_seconds).unwrap_or_default(),
                is_active,
                is_paused,
                resumed_at_ms: start_time.and_then(timestamp_ms),
            },
        }
    }
}

/// Parses a stored blob of any known shape. Returns [None] when the blob isn't a json object,
/// in which case the caller starts from defaults.
pub fn parse_tracker_state(blob: &str) -> Option<TrackerState> {
    match serde_json::from_str::<StoredTrackerState>(blob) {
        Ok(stored) => {
            if !matches!(stored, StoredTrackerState::Canonical(_)) {
                debug!("Migrating stored tracker state {stored:?}");
            }
            Some(stored.into())
        }
        Err(e) => {
            warn!("Stored tracker state {blob} is not recognized: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tracker::state::TrackerState;

    use super::parse_tracker_state;

    #[test]
    fn test_canonical_blob() {
        let state = parse_tracker_state(
            r#"{"accumulatedSeconds":42,"isActive":true,"isPaused":false,"resumedAtMs":1000}"#,
        );
        assert_eq!(
            state,
            Some(TrackerState {
                accumulated_seconds: 42,
                is_active: true,
                is_paused: false,
                resumed_at_ms: Some(1000),
            })
        );
    }

    #[test]
    fn test_fractional_canonical_blob_keeps_time() {
        let state = parse_tracker_state(
            r#"{"accumulatedSeconds":61.5,"isActive":true,"isPaused":false,"resumedAtMs":1000.9}"#,
        );
        assert_eq!(
            state,
            Some(TrackerState {
                accumulated_seconds: 61,
                is_active: true,
                is_paused: false,
                resumed_at_ms: Some(1000),
            })
        );
    }

    #[test]
    fn test_huge_canonical_values_saturate() {
        let state = parse_tracker_state(
            r#"{"accumulatedSeconds":18446744073709551615,"isActive":true,"resumedAtMs":-1e300}"#,
        );
        assert_eq!(
            state,
            Some(TrackerState {
                accumulated_seconds: u64::MAX,
                is_active: true,
                is_paused: false,
                resumed_at_ms: Some(i64::MIN),
            })
        );
    }

    #[test]
    fn test_legacy_blob_is_migrated() {
        let state = parse_tracker_state(
            r#"{"totalTime":120,"isActive":false,"isPaused":false,"startTime":null,"pausedTime":30}"#,
        );
        assert_eq!(
            state,
            Some(TrackerState {
                accumulated_seconds: 120,
                is_active: false,
                is_paused: false,
                resumed_at_ms: None,
            })
        );
    }

    #[test]
    fn test_accumulated_blob_is_migrated() {
        let state = parse_tracker_state(
            r#"{"accumulated":61.7,"isActive":true,"isPaused":false,"startTime":1700000000123}"#,
        );
        assert_eq!(
            state,
            Some(TrackerState {
                accumulated_seconds: 61,
                is_active: true,
                is_paused: false,
                resumed_at_ms: Some(1_700_000_000_123),
            })
        );
    }

    #[test]
    fn test_unknown_object_defaults() {
        assert_eq!(
            parse_tracker_state(r#"{"somethingElse":true}"#),
            Some(TrackerState::default())
        );
        assert_eq!(
            parse_tracker_state(r#"{"totalTime":-5,"isActive":true}"#),
            Some(TrackerState {
                is_active: true,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(parse_tracker_state("not json at all"), None);
        assert_eq!(parse_tracker_state("[1, 2, 3]"), None);
        assert_eq!(parse_tracker_state("17"), None);
    }
}
