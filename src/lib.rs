//! Session engine for body-language presence metrics and coached
//! conversation.
//!
//! The crate sits between three external collaborators, each behind a
//! narrow contract: a frame detector producing landmark sets per tick, a
//! transcription push stream, and a dialogue-generation service. It turns
//! the noisy per-frame signals into debounced events and durations, the
//! fragmented transcript into bounded conversational turns, and drives the
//! request/response loop with at most one dialogue call in flight.
//!
//! [`SessionController`] is the entry point: `start()`, `stop()`,
//! `request_summary()`, the metrics accessors, and the per-frame
//! `on_tick(timestamp, detections)` driven by the embedding application's
//! frame scheduler.

pub mod analytics;
pub mod config;
pub mod conversation;
pub mod dialogue;
pub mod landmarks;
pub mod metrics;
pub mod session;
pub mod stream;
pub mod tracking;
pub mod transcript;

pub use config::{SessionConfig, TrackingConfig};
pub use conversation::{ConversationTurn, Speaker};
pub use dialogue::{DialogueClient, DialogueReply, DialogueService};
pub use landmarks::{FrameDetections, Landmark};
pub use metrics::MetricsSnapshot;
pub use session::SessionController;
pub use stream::{StreamState, StreamStatus};
pub use tracking::{PresenceState, PresenceTracker};
