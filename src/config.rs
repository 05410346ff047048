use std::time::Duration;

/// Tunable thresholds for the signal classifiers.
///
/// The calibration values drifted across revisions of the original capture
/// pipeline, so they are configuration rather than fixed behavior.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Lower bound of the normalized iris position counted as facing forward.
    pub gaze_band_lower: f32,
    /// Upper bound of the normalized iris position counted as facing forward.
    pub gaze_band_upper: f32,
    /// Head-to-shoulder-midpoint distance below which posture is bad.
    pub posture_distance_threshold: f32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            gaze_band_lower: 0.4,
            gaze_band_upper: 0.6,
            posture_distance_threshold: 0.3,
        }
    }
}

/// Session-level wiring and timing configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tracking: TrackingConfig,

    /// Base URL of the dialogue-generation service.
    pub dialogue_base_url: String,
    /// Upper bound on a single dialogue-service round trip.
    pub dialogue_timeout: Duration,

    /// URL of the transcription push stream.
    pub transcription_stream_url: String,
    /// Delay before a dropped stream connection is retried.
    pub stream_retry_backoff: Duration,
    /// Consecutive transport failures tolerated before the stream is
    /// surfaced as persistently failed.
    pub stream_max_retries: u32,

    /// Quiet period with no new transcript fragment before a user turn is
    /// emitted.
    pub transcript_quiet_period: Duration,

    /// Minimum spacing between published metrics snapshots.
    pub metrics_publish_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            dialogue_base_url: "http://localhost:4000".into(),
            dialogue_timeout: Duration::from_secs(30),
            transcription_stream_url: "http://localhost:4000/api/transcription".into(),
            stream_retry_backoff: Duration::from_secs(2),
            stream_max_retries: 5,
            transcript_quiet_period: Duration::from_millis(5000),
            metrics_publish_interval: Duration::from_millis(1000),
        }
    }
}
