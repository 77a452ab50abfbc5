use serde::{Deserialize, Serialize};

/// How time that passed while the process was not running is treated when a running timer is
/// loaded from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DowntimePolicy {
    /// The timer kept running while the process was dead. The gap is folded into the total.
    #[default]
    Count,
    /// The gap is dropped and the timer continues from the moment of loading.
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Stopped,
    Running,
    Paused,
}

/// Persisted bookkeeping of the tracker.
///
/// `resumed_at_ms` is set exactly when the timer is active and not paused. Time before the open
/// segment lives in `accumulated_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub accumulated_seconds: u64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub resumed_at_ms: Option<i64>,
}

/// Whole seconds between two millisecond timestamps. A segment that ends before it starts is
/// empty.
pub fn segment_seconds(resumed_at_ms: i64, now_ms: i64) -> u64 {
    (now_ms.saturating_sub(resumed_at_ms).max(0) / 1000) as u64
}

impl TrackerState {
    pub fn is_running(&self) -> bool {
        self.is_active && !self.is_paused
    }

    pub fn status(&self) -> TrackerStatus {
        match (self.is_active, self.is_paused) {
            (false, _) => TrackerStatus::Stopped,
            (true, false) => TrackerStatus::Running,
            (true, true) => TrackerStatus::Paused,
        }
    }

    /// Seconds of the open segment, zero when none is open.
    fn open_segment(&self, now_ms: i64) -> u64 {
        match self.resumed_at_ms {
            Some(resumed) if self.is_running() => segment_seconds(resumed, now_ms),
            _ => 0,
        }
    }

    pub fn elapsed(&self, now_ms: i64) -> u64 {
        self.accumulated_seconds
            .saturating_add(self.open_segment(now_ms))
    }

    /// Moves the open segment into `accumulated_seconds` and closes it.
    fn fold(&mut self, now_ms: i64) {
        self.accumulated_seconds = self
            .accumulated_seconds
            .saturating_add(self.open_segment(now_ms));
        self.resumed_at_ms = None;
    }

    pub fn start(&mut self, now_ms: i64) {
        self.is_active = true;
        self.is_paused = false;
        self.resumed_at_ms = Some(now_ms);
    }

    pub fn stop(&mut self, now_ms: i64) {
        self.fold(now_ms);
        self.is_active = false;
        self.is_paused = false;
    }

    pub fn pause(&mut self, now_ms: i64) {
        if self.is_running() {
            self.fold(now_ms);
            self.is_paused = true;
        }
    }

    pub fn resume(&mut self, now_ms: i64) {
        if self.is_active && self.is_paused {
            self.is_paused = false;
            self.resumed_at_ms = Some(now_ms);
        }
    }

    /// Restores the timestamp invariant on a state coming from outside, e.g. a migrated blob.
    /// A running state without a timestamp is treated as resumed right now.
    pub fn normalize(&mut self, now_ms: i64) {
        if !self.is_active {
            self.is_paused = false;
            self.resumed_at_ms = None;
        } else if self.is_paused {
            self.resumed_at_ms = None;
        } else if self.resumed_at_ms.is_none() {
            self.resumed_at_ms = Some(now_ms);
        }
    }

    /// Applied to a state loaded on startup. A timer that was running when the process exited
    /// continues from `now_ms`, with the gap handled according to `policy`.
    pub fn reconcile(&mut self, now_ms: i64, policy: DowntimePolicy) {
        self.normalize(now_ms);
        if !self.is_running() {
            return;
        }
        if policy == DowntimePolicy::Count {
            self.fold(now_ms);
        }
        self.resumed_at_ms = Some(now_ms);
    }
}
