mod analyzer;
mod presence;

pub use analyzer::FrameAnalyzer;
pub use presence::{PresenceState, PresenceTracker};
