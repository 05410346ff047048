use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info};
use reqwest::Client;

use crate::metrics::MetricsSnapshot;

use super::types::{DialogueResponse, ReplyRequest, SummaryRequest};
use super::{DialogueReply, DialogueService};

/// HTTP client for the dialogue-generation service.
pub struct DialogueClient {
    client: Client,
    base_url: String,
}

impl DialogueClient {
    /// `timeout` bounds every round trip; a stalled service surfaces as a
    /// failure instead of blocking the conversation indefinitely.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build dialogue http client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn post(&self, path: &str, body: &impl serde::Serialize) -> Result<DialogueReply> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("dialogue request to {path} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            bail!("dialogue service returned {status}: {detail}");
        }

        let parsed: DialogueResponse = response
            .json()
            .await
            .context("malformed dialogue service response")?;

        let audio_wav = match parsed.audio {
            Some(encoded) => Some(
                BASE64
                    .decode(encoded)
                    .context("invalid base64 audio payload")?,
            ),
            None => None,
        };

        if let Some(audio) = &audio_wav {
            debug!("dialogue reply carries {} bytes of wav audio", audio.len());
        }

        Ok(DialogueReply {
            text: parsed.message,
            audio_wav,
        })
    }
}

#[async_trait]
impl DialogueService for DialogueClient {
    async fn generate_reply(&self, history: &str) -> Result<DialogueReply> {
        debug!("requesting dialogue reply ({} chars of history)", history.len());
        let reply = self.post("/api/reply", &ReplyRequest { history }).await?;
        info!("dialogue reply received ({} chars)", reply.text.len());
        Ok(reply)
    }

    async fn summarize(&self, history: &str, metrics: &MetricsSnapshot) -> Result<DialogueReply> {
        debug!("requesting session summary");
        self.post("/api/summary", &SummaryRequest { history, metrics })
            .await
    }
}
