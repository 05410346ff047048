use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{debug, info};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::conversation::{ConversationOrchestrator, ConversationTurn};
use crate::dialogue::{DialogueClient, DialogueReply, DialogueService};
use crate::landmarks::FrameDetections;
use crate::metrics::{MetricsPublisher, MetricsSnapshot};
use crate::stream::{StreamClient, StreamState, TranscriptionEvent};
use crate::tracking::FrameAnalyzer;
use crate::transcript::{TranscriptAggregator, TranscriptFragment};

struct SessionRuntime {
    session_id: String,
    cancel: CancellationToken,
    stream: StreamClient,
    stream_state: watch::Receiver<StreamState>,
    aggregator: Arc<TranscriptAggregator>,
    pump: JoinHandle<()>,
    turn_task: JoinHandle<()>,
}

/// The control surface surrounding code drives: `start`, `stop`,
/// `request_summary`, the metrics accessors, and the per-frame `on_tick`.
///
/// The tick path only touches the frame analyzer and the rate-limited
/// publisher; all I/O (stream, dialogue service) lives on background tasks.
pub struct SessionController {
    config: SessionConfig,
    analyzer: StdMutex<FrameAnalyzer>,
    publisher: StdMutex<MetricsPublisher>,
    metrics_rx: watch::Receiver<MetricsSnapshot>,
    orchestrator: ConversationOrchestrator,
    replies_rx: StdMutex<Option<mpsc::UnboundedReceiver<DialogueReply>>>,
    live_partial_tx: watch::Sender<String>,
    runtime: Mutex<Option<SessionRuntime>>,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let client = DialogueClient::new(&config.dialogue_base_url, config.dialogue_timeout)?;
        Ok(Self::with_service(config, Arc::new(client)))
    }

    /// Inject an alternative dialogue service implementation.
    pub fn with_service(config: SessionConfig, service: Arc<dyn DialogueService>) -> Self {
        let publisher = MetricsPublisher::new(config.metrics_publish_interval);
        let metrics_rx = publisher.subscribe();
        let (orchestrator, replies_rx) = ConversationOrchestrator::new(service);
        let (live_partial_tx, _) = watch::channel(String::new());

        Self {
            analyzer: StdMutex::new(FrameAnalyzer::new(config.tracking.clone())),
            publisher: StdMutex::new(publisher),
            metrics_rx,
            orchestrator,
            replies_rx: StdMutex::new(Some(replies_rx)),
            live_partial_tx,
            runtime: Mutex::new(None),
            config,
        }
    }

    /// Begin a session: open the transcription stream and wire it through
    /// the debounce aggregator into the conversation orchestrator.
    ///
    /// Starting twice without an intervening `stop` is a caller error and is
    /// reported synchronously.
    pub async fn start(&self) -> Result<String> {
        let mut runtime_guard = self.runtime.lock().await;
        if runtime_guard.is_some() {
            bail!("session already active");
        }

        let session_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut stream = StreamClient::new(
            &self.config.transcription_stream_url,
            self.config.stream_retry_backoff,
            self.config.stream_max_retries,
            events_tx,
        )?;
        let stream_state = stream.state_watch();
        stream.start().context("failed to start transcription stream")?;

        let (aggregator, turns_rx) = TranscriptAggregator::spawn(
            self.config.transcript_quiet_period,
            cancel.child_token(),
        );
        let aggregator = Arc::new(aggregator);

        let pump = tokio::spawn(pump_stream_events(
            events_rx,
            Arc::clone(&aggregator),
            self.live_partial_tx.clone(),
            cancel.clone(),
        ));

        let turn_task = tokio::spawn(forward_turns(turns_rx, self.orchestrator.clone()));

        info!("session {session_id} started");
        *runtime_guard = Some(SessionRuntime {
            session_id: session_id.clone(),
            cancel,
            stream,
            stream_state,
            aggregator,
            pump,
            turn_task,
        });

        Ok(session_id)
    }

    /// Stop the session: cancel pending debounce/retry timers, close the
    /// stream, flush (not discard) in-progress presence durations, and
    /// publish a final snapshot. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let mut runtime_guard = self.runtime.lock().await;
        let Some(mut runtime) = runtime_guard.take() else {
            debug!("stop called with no active session");
            return Ok(());
        };
        drop(runtime_guard);

        runtime.cancel.cancel();
        runtime.stream.stop().await?;

        runtime
            .pump
            .await
            .context("stream pump task failed to join")?;
        // The pump held the only other handle; unwrap to drive the
        // aggregator task to completion.
        if let Ok(aggregator) = Arc::try_unwrap(runtime.aggregator) {
            aggregator.join().await;
        }
        runtime
            .turn_task
            .await
            .context("turn forwarding task failed to join")?;

        let snapshot = {
            let mut analyzer = self.analyzer.lock().unwrap();
            analyzer.flush();
            analyzer.snapshot()
        };
        self.publisher.lock().unwrap().publish_now(snapshot);

        info!("session {} stopped", runtime.session_id);
        Ok(())
    }

    /// Per-frame entry point, driven by the external tick source at the
    /// device's frame cadence. Never blocks and never performs I/O.
    pub fn on_tick(&self, timestamp_ms: f64, detections: &FrameDetections) {
        let mut analyzer = self.analyzer.lock().unwrap();
        analyzer.on_frame(timestamp_ms, detections);

        let mut publisher = self.publisher.lock().unwrap();
        publisher.maybe_publish(|| analyzer.snapshot());
    }

    /// Latest published metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics_rx.borrow().clone()
    }

    pub fn metrics_watch(&self) -> watch::Receiver<MetricsSnapshot> {
        self.publisher.lock().unwrap().subscribe()
    }

    /// Live partial transcription text, updated as non-final fragments
    /// arrive.
    pub fn live_partial_watch(&self) -> watch::Receiver<String> {
        self.live_partial_tx.subscribe()
    }

    /// Receiver for completed agent replies (text plus optional synthesized
    /// audio). Can be taken once.
    pub fn take_replies(&self) -> Option<mpsc::UnboundedReceiver<DialogueReply>> {
        self.replies_rx.lock().unwrap().take()
    }

    /// Ask the dialogue service for a session summary from the conversation
    /// history and the latest metrics snapshot. Independent of the
    /// turn-taking guard.
    pub async fn request_summary(&self) -> Result<DialogueReply> {
        let snapshot = self.metrics();
        self.orchestrator.request_summary(&snapshot).await
    }

    /// Emit whatever transcript is buffered instead of waiting out the quiet
    /// period. No-op when no session is active.
    pub async fn flush_transcript(&self) {
        if let Some(runtime) = self.runtime.lock().await.as_ref() {
            runtime.aggregator.request_final_flush();
        }
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.orchestrator.turns().await
    }

    /// Explicit user action; never invoked implicitly.
    pub async fn clear_history(&self) {
        self.orchestrator.clear_history().await;
    }

    pub fn last_dialogue_error(&self) -> Option<String> {
        self.orchestrator.last_error()
    }

    pub async fn is_active(&self) -> bool {
        self.runtime.lock().await.is_some()
    }

    pub async fn stream_state(&self) -> StreamState {
        match self.runtime.lock().await.as_ref() {
            Some(runtime) => runtime.stream_state.borrow().clone(),
            None => StreamState::default(),
        }
    }
}

async fn pump_stream_events(
    mut events_rx: mpsc::UnboundedReceiver<TranscriptionEvent>,
    aggregator: Arc<TranscriptAggregator>,
    live_partial_tx: watch::Sender<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events_rx.recv() => match event {
                Some(event) => {
                    if event.is_final {
                        let _ = live_partial_tx.send(String::new());
                        aggregator.append(TranscriptFragment {
                            text: event.text,
                            device: event.device,
                            is_final: true,
                            received_at_ms: Utc::now().timestamp_millis() as f64,
                        });
                    } else {
                        // Partial fragments only feed the live feed; the
                        // final revision carries the same words.
                        let _ = live_partial_tx.send(event.text);
                    }
                }
                None => break,
            },
        }
    }
}

async fn forward_turns(
    mut turns_rx: mpsc::UnboundedReceiver<String>,
    orchestrator: ConversationOrchestrator,
) {
    while let Some(utterance) = turns_rx.recv().await {
        orchestrator.on_user_turn_ready(utterance).await;
    }
}
