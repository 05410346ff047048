use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracking::PresenceState;

/// Immutable copy of all tracked presence signals at one point in time.
///
/// Published at a bounded rate so downstream consumers (dialogue summaries,
/// reporting sinks) are decoupled from the per-frame tick path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub hand: PresenceState,
    pub gaze_away: PresenceState,
    pub bad_posture: PresenceState,
    pub hand_present: bool,
    pub face_present: bool,
    pub pose_present: bool,
}
