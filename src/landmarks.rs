use serde::{Deserialize, Serialize};

/// Landmark indices used by the classifiers, following the external
/// detector's documented scheme.
pub mod index {
    /// Head/nose landmark in a pose landmark set.
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;

    /// Right eye corners in a face mesh landmark set.
    pub const RIGHT_EYE_OUTER: usize = 33;
    pub const RIGHT_EYE_INNER: usize = 133;

    /// First landmark of the right iris cluster.
    pub const IRIS_START: usize = 468;
    pub const IRIS_POINTS: usize = 5;

    /// A face mesh must reach past the iris cluster to be usable for gaze.
    pub const FACE_MESH_MIN_LANDMARKS: usize = IRIS_START + IRIS_POINTS;
}

/// A single normalized detector landmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One tick's worth of detector output: zero or more landmark sets per
/// detector kind. Produced by the external frame detector and consumed
/// immediately by the tick path; never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDetections {
    pub hands: Vec<Vec<Landmark>>,
    pub faces: Vec<Vec<Landmark>>,
    pub poses: Vec<Vec<Landmark>>,
}

impl FrameDetections {
    /// Any detected hand counts; subject identity is not tracked.
    pub fn any_hand(&self) -> bool {
        self.hands.iter().any(|set| !set.is_empty())
    }

    /// The primary face landmark set, if a face was detected this tick.
    pub fn primary_face(&self) -> Option<&[Landmark]> {
        self.faces.iter().find(|set| !set.is_empty()).map(|s| s.as_slice())
    }

    /// The primary pose landmark set, if a pose was detected this tick.
    pub fn primary_pose(&self) -> Option<&[Landmark]> {
        self.poses.iter().find(|set| !set.is_empty()).map(|s| s.as_slice())
    }
}
