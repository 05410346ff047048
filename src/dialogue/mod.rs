mod client;
mod types;

pub use client::DialogueClient;
pub use types::DialogueReply;

use anyhow::Result;
use async_trait::async_trait;

use crate::metrics::MetricsSnapshot;

/// Seam between the conversation orchestrator and the external
/// dialogue-generation service.
#[async_trait]
pub trait DialogueService: Send + Sync {
    /// Generate the coach's reply to the conversation so far.
    async fn generate_reply(&self, history: &str) -> Result<DialogueReply>;

    /// Generate a session summary from the conversation plus the
    /// body-language metrics snapshot.
    async fn summarize(&self, history: &str, metrics: &MetricsSnapshot) -> Result<DialogueReply>;
}
