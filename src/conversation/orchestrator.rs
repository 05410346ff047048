use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Result;
use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex, Semaphore};

use crate::dialogue::{DialogueReply, DialogueService};
use crate::metrics::MetricsSnapshot;

use super::history::{ConversationHistory, ConversationTurn};

/// Owns the conversation history and the single-slot in-flight guard for
/// dialogue-service calls.
///
/// Every user turn is appended to history; a service call is only issued
/// when no other call is outstanding, so overlapping requests can never
/// interleave agent turns out of order.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    history: Arc<Mutex<ConversationHistory>>,
    in_flight: Arc<Semaphore>,
    service: Arc<dyn DialogueService>,
    replies_tx: mpsc::UnboundedSender<DialogueReply>,
    last_error: Arc<StdMutex<Option<String>>>,
}

impl ConversationOrchestrator {
    pub fn new(
        service: Arc<dyn DialogueService>,
    ) -> (Self, mpsc::UnboundedReceiver<DialogueReply>) {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            history: Arc::new(Mutex::new(ConversationHistory::new())),
            in_flight: Arc::new(Semaphore::new(1)),
            service,
            replies_tx,
            last_error: Arc::new(StdMutex::new(None)),
        };
        (orchestrator, replies_rx)
    }

    /// Append the user's turn and, unless a dialogue call is already
    /// outstanding, issue one with the full history as context.
    pub async fn on_user_turn_ready(&self, text: String) {
        let rendered = {
            let mut history = self.history.lock().await;
            history.push_user(text);
            history.render()
        };

        let permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                // Turn stays in history; the outstanding call's reply will
                // see it on the next exchange.
                debug!("dialogue call already in flight, holding turn in history");
                return;
            }
        };

        let history = Arc::clone(&self.history);
        let service = Arc::clone(&self.service);
        let replies_tx = self.replies_tx.clone();
        let last_error = Arc::clone(&self.last_error);

        tokio::spawn(async move {
            match service.generate_reply(&rendered).await {
                Ok(reply) => {
                    let appended = history.lock().await.push_agent(reply.text.clone());
                    match appended {
                        Ok(()) => {
                            info!("agent turn appended ({} chars)", reply.text.len());
                            let _ = replies_tx.send(reply);
                        }
                        Err(err) => error!("dropping agent turn: {err}"),
                    }
                }
                Err(err) => {
                    // History stays consistent: no partial agent turn.
                    error!("dialogue service call failed: {err:#}");
                    *last_error.lock().unwrap() = Some(err.to_string());
                }
            }
            drop(permit);
        });
    }

    /// Summary requests bypass the turn-taking guard and may run while a
    /// reply call is outstanding.
    pub async fn request_summary(&self, metrics: &MetricsSnapshot) -> Result<DialogueReply> {
        let rendered = self.history.lock().await.render();
        self.service.summarize(&rendered, metrics).await
    }

    pub async fn turns(&self) -> Vec<ConversationTurn> {
        self.history.lock().await.turns().to_vec()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Speaker;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockService {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl MockService {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
            })
        }
    }

    #[async_trait]
    impl DialogueService for MockService {
        async fn generate_reply(&self, _history: &str) -> Result<DialogueReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                bail!("service unavailable");
            }
            Ok(DialogueReply {
                text: "good answer".into(),
                audio_wav: None,
            })
        }

        async fn summarize(
            &self,
            _history: &str,
            _metrics: &MetricsSnapshot,
        ) -> Result<DialogueReply> {
            Ok(DialogueReply {
                text: "summary".into(),
                audio_wav: None,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_turn_does_not_issue_overlapping_call() {
        let service = MockService::new(Duration::from_secs(2), false);
        let (orchestrator, mut replies) = ConversationOrchestrator::new(service.clone());

        orchestrator.on_user_turn_ready("first answer".into()).await;
        orchestrator.on_user_turn_ready("second answer".into()).await;

        replies.recv().await.expect("first call should complete");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        // Both user turns were kept, plus one agent turn.
        let turns = orchestrator.turns().await;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].speaker, Speaker::User);
        assert_eq!(turns[1].speaker, Speaker::User);
        assert_eq!(turns[2].speaker, Speaker::Agent);
    }

    #[tokio::test(start_paused = true)]
    async fn guard_releases_after_completion() {
        let service = MockService::new(Duration::from_millis(10), false);
        let (orchestrator, mut replies) = ConversationOrchestrator::new(service.clone());

        orchestrator.on_user_turn_ready("first".into()).await;
        replies.recv().await.unwrap();

        orchestrator.on_user_turn_ready("second".into()).await;
        replies.recv().await.unwrap();

        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.turns().await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_leaves_history_consistent_and_releases_guard() {
        let failing = MockService::new(Duration::from_millis(10), true);
        let (orchestrator, _replies) = ConversationOrchestrator::new(failing.clone());

        orchestrator.on_user_turn_ready("doomed".into()).await;

        // Let the spawned call fail and release the guard.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let turns = orchestrator.turns().await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker, Speaker::User);
        assert!(orchestrator.last_error().is_some());

        // Guard must be free again.
        orchestrator.on_user_turn_ready("retry".into()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn summary_ignores_the_turn_guard() {
        let service = MockService::new(Duration::from_secs(5), false);
        let (orchestrator, _replies) = ConversationOrchestrator::new(service.clone());

        orchestrator.on_user_turn_ready("long call".into()).await;

        // Issued while the reply call is still outstanding.
        let summary = orchestrator
            .request_summary(&MetricsSnapshot::default())
            .await
            .unwrap();
        assert_eq!(summary.text, "summary");
    }
}
