use serde::{Deserialize, Serialize};

/// Snapshot of one tracked signal: how many discrete occurrences started and
/// how long the signal has been active in total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceState {
    pub is_active: bool,
    pub active_since_ms: Option<f64>,
    pub event_count: u64,
    pub accumulated_duration_ms: f64,
}

/// Edge-detecting state machine over a per-tick boolean signal.
///
/// `event_count` increments only on rising edges; `accumulated_duration_ms`
/// grows only on falling edges (or a forced [`flush`](Self::flush)), by the
/// wall-clock delta between the rising-edge timestamp and the edge that ends
/// the occurrence. Tick cadence is irrelevant to correctness.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    state: PresenceState,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, timestamp_ms: f64, is_active_now: bool) {
        match (self.state.is_active, is_active_now) {
            (false, true) => {
                // Rising edge: a new discrete occurrence begins.
                self.state.event_count += 1;
                self.state.active_since_ms = Some(timestamp_ms);
                self.state.is_active = true;
            }
            (true, false) => {
                // Falling edge: commit the occurrence's duration.
                if let Some(since) = self.state.active_since_ms.take() {
                    self.state.accumulated_duration_ms += (timestamp_ms - since).max(0.0);
                }
                self.state.is_active = false;
            }
            _ => {}
        }
    }

    /// Commit any in-progress occurrence as if a falling edge happened now,
    /// without counting a new event. Required at teardown so active duration
    /// is never silently lost; the tracker stays active so a later falling
    /// edge does not double-count.
    pub fn flush(&mut self, timestamp_ms: f64) {
        if !self.state.is_active {
            return;
        }
        if let Some(since) = self.state.active_since_ms {
            self.state.accumulated_duration_ms += (timestamp_ms - since).max(0.0);
            self.state.active_since_ms = Some(timestamp_ms);
        }
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn snapshot(&self) -> PresenceState {
        self.state.clone()
    }
}
