mod client;
mod sse;

pub use client::StreamClient;
pub use sse::{SseEvent, SseParser};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamStatus {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// Connection state published to observers alongside the retry counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamState {
    pub status: StreamStatus,
    pub retry_count: u32,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            status: StreamStatus::Idle,
            retry_count: 0,
        }
    }
}

/// A well-formed `transcription` event off the push stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionEvent {
    pub device: String,
    pub is_final: bool,
    pub text: String,
}
