use chrono::Utc;

use crate::analytics::{is_bad_posture, is_facing_forward};
use crate::config::TrackingConfig;
use crate::landmarks::FrameDetections;
use crate::metrics::MetricsSnapshot;

use super::presence::PresenceTracker;

/// Applies the classifiers to each frame and feeds the three presence
/// trackers. Owned exclusively by the tick path; mutated only on tick
/// boundaries.
pub struct FrameAnalyzer {
    config: TrackingConfig,
    hand: PresenceTracker,
    gaze_away: PresenceTracker,
    bad_posture: PresenceTracker,
    hand_present: bool,
    face_present: bool,
    pose_present: bool,
    last_timestamp_ms: Option<f64>,
}

impl FrameAnalyzer {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            hand: PresenceTracker::new(),
            gaze_away: PresenceTracker::new(),
            bad_posture: PresenceTracker::new(),
            hand_present: false,
            face_present: false,
            pose_present: false,
            last_timestamp_ms: None,
        }
    }

    pub fn on_frame(&mut self, timestamp_ms: f64, detections: &FrameDetections) {
        self.hand_present = detections.any_hand();
        self.hand.observe(timestamp_ms, self.hand_present);

        // Gaze is only judged while a face is on screen; an absent detector
        // degrades to an inactive signal rather than a false event.
        let face = detections.primary_face();
        self.face_present = face.is_some();
        let gaze_away = face
            .map(|landmarks| !is_facing_forward(landmarks, &self.config))
            .unwrap_or(false);
        self.gaze_away.observe(timestamp_ms, gaze_away);

        let pose = detections.primary_pose();
        self.pose_present = pose.is_some();
        let bad_posture = pose
            .map(|landmarks| is_bad_posture(landmarks, &self.config))
            .unwrap_or(false);
        self.bad_posture.observe(timestamp_ms, bad_posture);

        self.last_timestamp_ms = Some(timestamp_ms);
    }

    /// Commit in-progress durations up to the last observed frame. Called at
    /// session teardown so no active interval is lost.
    pub fn flush(&mut self) {
        if let Some(timestamp_ms) = self.last_timestamp_ms {
            self.hand.flush(timestamp_ms);
            self.gaze_away.flush(timestamp_ms);
            self.bad_posture.flush(timestamp_ms);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            captured_at: Utc::now(),
            hand: self.hand.snapshot(),
            gaze_away: self.gaze_away.snapshot(),
            bad_posture: self.bad_posture.snapshot(),
            hand_present: self.hand_present,
            face_present: self.face_present,
            pose_present: self.pose_present,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{index, Landmark};

    fn hand_frame() -> FrameDetections {
        FrameDetections {
            hands: vec![vec![Landmark::default(); 21]],
            ..Default::default()
        }
    }

    fn slouched_pose_frame() -> FrameDetections {
        let mut pose = vec![Landmark::default(); index::RIGHT_SHOULDER + 1];
        pose[index::NOSE] = Landmark::new(0.5, 0.0, 0.0);
        pose[index::LEFT_SHOULDER] = Landmark::new(0.45, 0.1, 0.0);
        pose[index::RIGHT_SHOULDER] = Landmark::new(0.55, 0.1, 0.0);
        FrameDetections {
            poses: vec![pose],
            ..Default::default()
        }
    }

    #[test]
    fn two_hands_collapse_to_one_occurrence() {
        let mut analyzer = FrameAnalyzer::new(TrackingConfig::default());

        let mut frame = hand_frame();
        frame.hands.push(vec![Landmark::default(); 21]);
        analyzer.on_frame(0.0, &frame);
        analyzer.on_frame(100.0, &FrameDetections::default());

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.hand.event_count, 1);
        assert_eq!(snapshot.hand.accumulated_duration_ms, 100.0);
    }

    #[test]
    fn no_face_never_counts_as_gaze_away() {
        let mut analyzer = FrameAnalyzer::new(TrackingConfig::default());

        for i in 0..10 {
            analyzer.on_frame(i as f64 * 33.0, &FrameDetections::default());
        }

        assert_eq!(analyzer.snapshot().gaze_away.event_count, 0);
    }

    #[test]
    fn flush_commits_active_durations_at_last_frame() {
        let mut analyzer = FrameAnalyzer::new(TrackingConfig::default());

        analyzer.on_frame(0.0, &slouched_pose_frame());
        analyzer.on_frame(500.0, &slouched_pose_frame());
        analyzer.flush();

        let snapshot = analyzer.snapshot();
        assert_eq!(snapshot.bad_posture.event_count, 1);
        assert_eq!(snapshot.bad_posture.accumulated_duration_ms, 500.0);
    }

    #[test]
    fn flush_before_any_frame_is_safe() {
        let mut analyzer = FrameAnalyzer::new(TrackingConfig::default());
        analyzer.flush();
        assert_eq!(analyzer.snapshot().hand.accumulated_duration_ms, 0.0);
    }
}
