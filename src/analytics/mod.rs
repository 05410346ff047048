//! Pure landmark classifiers. Stateless; fail safe on missing or degenerate
//! input so a bad frame can never abort the tick loop or fabricate an event.

use log::warn;

use crate::config::TrackingConfig;
use crate::landmarks::{index, Landmark};

/// Whether a face mesh landmark set indicates a forward gaze.
///
/// Projects the iris centroid onto the line between the two right-eye corner
/// landmarks; the normalized position `t` along that line must fall inside
/// the configured central band.
pub fn is_facing_forward(landmarks: &[Landmark], config: &TrackingConfig) -> bool {
    if landmarks.len() < index::FACE_MESH_MIN_LANDMARKS {
        warn!(
            "not enough landmarks for gaze estimation: {} < {}",
            landmarks.len(),
            index::FACE_MESH_MIN_LANDMARKS
        );
        return false;
    }

    let outer = landmarks[index::RIGHT_EYE_OUTER];
    let inner = landmarks[index::RIGHT_EYE_INNER];
    let iris = &landmarks[index::IRIS_START..index::IRIS_START + index::IRIS_POINTS];

    let mut cx = 0.0f32;
    let mut cy = 0.0f32;
    for point in iris {
        cx += point.x;
        cy += point.y;
    }
    cx /= iris.len() as f32;
    cy /= iris.len() as f32;

    // Vector from the outer corner to the inner corner, and from the outer
    // corner to the iris centroid.
    let ab = (inner.x - outer.x, inner.y - outer.y);
    let ai = (cx - outer.x, cy - outer.y);

    let dot = ai.0 * ab.0 + ai.1 * ab.1;
    let norm2 = ab.0 * ab.0 + ab.1 * ab.1;
    if norm2 == 0.0 {
        // Degenerate eye line; fail safe to not-forward.
        return false;
    }

    let t = dot / norm2;
    t >= config.gaze_band_lower && t <= config.gaze_band_upper
}

/// Whether a pose landmark set indicates bad posture.
///
/// Bad posture is the head landmark sitting too close to the midpoint of the
/// shoulder line (slouching/leaning). Missing landmarks classify as not-bad
/// so an incomplete pose never produces a false event.
pub fn is_bad_posture(landmarks: &[Landmark], config: &TrackingConfig) -> bool {
    let (Some(head), Some(left), Some(right)) = (
        landmarks.get(index::NOSE),
        landmarks.get(index::LEFT_SHOULDER),
        landmarks.get(index::RIGHT_SHOULDER),
    ) else {
        return false;
    };

    let mid_x = (left.x + right.x) / 2.0;
    let mid_y = (left.y + right.y) / 2.0;

    let dx = head.x - mid_x;
    let dy = head.y - mid_y;
    let distance = (dx * dx + dy * dy).sqrt();

    distance < config.posture_distance_threshold
}
