use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One speech-to-text chunk as it arrives off the push stream.
#[derive(Debug, Clone)]
pub struct TranscriptFragment {
    pub text: String,
    pub device: String,
    pub is_final: bool,
    pub received_at_ms: f64,
}

enum Command {
    Append(String),
    FinalFlush,
}

/// Buffers transcript fragments and emits one aggregated user utterance per
/// quiet period.
///
/// Every [`append`](Self::append) resets the single pending timer; when the
/// quiet period elapses with no new fragment, the buffered fragments are
/// joined and emitted once, and the buffer is cleared. Cancelling the token
/// discards the pending timer without emitting; call
/// [`request_final_flush`](Self::request_final_flush) first if the partial
/// buffer should still be delivered.
pub struct TranscriptAggregator {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl TranscriptAggregator {
    pub fn spawn(
        quiet_period: Duration,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (turns_tx, turns_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(quiet_period, cancel, rx, turns_tx));
        (Self { tx, handle }, turns_rx)
    }

    pub fn append(&self, fragment: TranscriptFragment) {
        if fragment.text.is_empty() {
            return;
        }
        let _ = self.tx.send(Command::Append(fragment.text));
    }

    /// Ask the aggregator to emit whatever is buffered right now instead of
    /// waiting out the quiet period.
    pub fn request_final_flush(&self) {
        let _ = self.tx.send(Command::FinalFlush);
    }

    pub async fn join(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

async fn run(
    quiet_period: Duration,
    cancel: CancellationToken,
    mut rx: mpsc::UnboundedReceiver<Command>,
    turns_tx: mpsc::UnboundedSender<String>,
) {
    let mut buffer: Vec<String> = Vec::new();
    // Single timer slot; a new fragment replaces the deadline, never stacks.
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("transcript aggregator cancelled with {} buffered fragments", buffer.len());
                break;
            }
            command = rx.recv() => match command {
                Some(Command::Append(text)) => {
                    buffer.push(text);
                    deadline = Some(Instant::now() + quiet_period);
                }
                Some(Command::FinalFlush) => {
                    emit(&mut buffer, &turns_tx);
                    deadline = None;
                }
                None => break,
            },
            _ = async { tokio::time::sleep_until(deadline.unwrap()).await }, if deadline.is_some() => {
                emit(&mut buffer, &turns_tx);
                deadline = None;
            }
        }
    }
}

fn emit(buffer: &mut Vec<String>, turns_tx: &mpsc::UnboundedSender<String>) {
    if buffer.is_empty() {
        return;
    }
    let utterance = buffer.join(" ");
    buffer.clear();
    info!("transcript quiet period elapsed, emitting turn ({} chars)", utterance.len());
    let _ = turns_tx.send(utterance);
}
