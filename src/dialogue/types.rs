use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReplyRequest<'a> {
    pub history: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SummaryRequest<'a> {
    pub history: &'a str,
    pub metrics: &'a MetricsSnapshot,
}

/// Wire response: generated text plus optional base64-encoded WAV audio.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DialogueResponse {
    pub message: String,
    #[serde(default)]
    pub audio: Option<String>,
}

/// A generated reply with the audio payload already decoded.
#[derive(Debug, Clone)]
pub struct DialogueReply {
    pub text: String,
    pub audio_wav: Option<Vec<u8>>,
}
