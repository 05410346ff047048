use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::sse::{SseEvent, SseParser};
use super::{StreamState, StreamStatus, TranscriptionEvent};

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: String,
}

/// Long-lived push-stream consumer with reconnect/backoff.
///
/// One background task owns the connection. Transport failures move the
/// state to `Reconnecting` and schedule a single backoff timer; exceeding
/// the bounded retry count lands in `Failed`. A malformed payload is logged
/// and dropped without tearing down the connection. `stop` is idempotent
/// from any state and always lands in `Idle` with no pending timer.
pub struct StreamClient {
    url: String,
    http: Client,
    backoff: Duration,
    max_retries: u32,
    state_tx: watch::Sender<StreamState>,
    events_tx: mpsc::UnboundedSender<TranscriptionEvent>,
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl StreamClient {
    pub fn new(
        url: impl Into<String>,
        backoff: Duration,
        max_retries: u32,
        events_tx: mpsc::UnboundedSender<TranscriptionEvent>,
    ) -> Result<Self> {
        // Connect timeout only: the response body is an endless stream, so a
        // total request timeout would sever healthy connections.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build stream http client")?;

        let (state_tx, _) = watch::channel(StreamState::default());

        Ok(Self {
            url: url.into(),
            http,
            backoff,
            max_retries,
            state_tx,
            events_tx,
            handle: None,
            cancel: None,
        })
    }

    pub fn state_watch(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> StreamState {
        self.state_tx.borrow().clone()
    }

    pub fn start(&mut self) -> Result<()> {
        // Gate on the published status rather than task liveness: a worker
        // that just published `Failed` may not have finished unwinding yet,
        // and a restart from `Failed` must not race with that.
        let status = self.state_tx.borrow().status;
        if !matches!(status, StreamStatus::Idle | StreamStatus::Failed) {
            bail!("stream already active");
        }

        let cancel = CancellationToken::new();
        let worker = Worker {
            url: self.url.clone(),
            http: self.http.clone(),
            backoff: self.backoff,
            max_retries: self.max_retries,
            state_tx: self.state_tx.clone(),
            events_tx: self.events_tx.clone(),
            cancel: cancel.clone(),
        };

        // Published before the spawn so an immediate second `start` sees the
        // stream as active.
        let _ = self.state_tx.send(StreamState {
            status: StreamStatus::Connecting,
            retry_count: 0,
        });
        self.handle = Some(tokio::spawn(worker.run()));
        self.cancel = Some(cancel);
        Ok(())
    }

    /// Cancel any pending retry, close the connection, and land in `Idle`.
    /// Safe to call repeatedly.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle.await.context("stream worker failed to join")?;
        }

        let _ = self.state_tx.send(StreamState::default());
        Ok(())
    }
}

struct Worker {
    url: String,
    http: Client,
    backoff: Duration,
    max_retries: u32,
    state_tx: watch::Sender<StreamState>,
    events_tx: mpsc::UnboundedSender<TranscriptionEvent>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let mut retry_count = 0u32;

        loop {
            self.set_state(StreamStatus::Connecting, retry_count);

            match self.connect_and_pump(&mut retry_count).await {
                Ok(()) => {
                    debug!("stream worker cancelled");
                    return;
                }
                Err(err) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    retry_count += 1;
                    if retry_count > self.max_retries {
                        error!("push stream failed after {} retries: {err:#}", self.max_retries);
                        self.set_state(StreamStatus::Failed, retry_count);
                        return;
                    }
                    warn!(
                        "push stream error ({err:#}); retry {}/{} in {:?}",
                        retry_count, self.max_retries, self.backoff
                    );
                    self.set_state(StreamStatus::Reconnecting, retry_count);

                    // Single backoff timer; cancellation discards it.
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }

    /// Returns `Ok(())` on cancellation, `Err` on any transport failure.
    async fn connect_and_pump(&self, retry_count: &mut u32) -> Result<()> {
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = self.http.get(&self.url).send() => {
                result.context("push stream connect failed")?
            }
        };

        let response = response
            .error_for_status()
            .context("push stream rejected the connection")?;

        let mut body = response.bytes_stream();
        let mut parser = SseParser::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.feed(&bytes) {
                            self.handle_event(event, retry_count);
                        }
                    }
                    Some(Err(err)) => return Err(err).context("push stream read failed"),
                    None => bail!("push stream closed by server"),
                },
            }
        }
    }

    fn handle_event(&self, event: SseEvent, retry_count: &mut u32) {
        match event.name.as_str() {
            "connected" => {
                info!("push stream connected");
                *retry_count = 0;
                self.set_state(StreamStatus::Connected, 0);
            }
            "transcription" => match serde_json::from_str::<TranscriptionEvent>(&event.data) {
                Ok(transcription) => {
                    let _ = self.events_tx.send(transcription);
                }
                Err(err) => {
                    // One bad message is not worth the connection.
                    warn!("dropping malformed transcription payload: {err}");
                }
            },
            "error" => match serde_json::from_str::<ErrorEvent>(&event.data) {
                Ok(reported) => warn!("push stream reported error: {}", reported.error),
                Err(_) => warn!("push stream reported an unreadable error event"),
            },
            other => debug!("ignoring unknown stream event '{other}'"),
        }
    }

    fn set_state(&self, status: StreamStatus, retry_count: u32) {
        let _ = self.state_tx.send(StreamState {
            status,
            retry_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const RESPONSE_HEAD: &[u8] =
        b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

    async fn read_request(sock: &mut tokio::net::TcpStream) {
        let mut buf = [0u8; 1024];
        let _ = sock.read(&mut buf).await;
    }

    #[tokio::test]
    async fn connects_and_forwards_transcriptions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_request(&mut sock).await;
            sock.write_all(RESPONSE_HEAD).await.unwrap();
            sock.write_all(b"event: connected\ndata: {\"status\":\"connected\"}\n\n")
                .await
                .unwrap();
            sock.write_all(
                b"event: transcription\ndata: {\"device\":\"mic\",\"isFinal\":true,\"text\":\"hello\"}\n\n",
            )
            .await
            .unwrap();
            // Hold the connection open until the test finishes.
            std::future::pending::<()>().await;
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut client = StreamClient::new(
            format!("http://{addr}/stream"),
            Duration::from_millis(50),
            3,
            events_tx,
        )
        .unwrap();
        let mut state = client.state_watch();

        client.start().unwrap();

        let event = events_rx.recv().await.expect("transcription should arrive");
        assert_eq!(event.text, "hello");
        assert!(event.is_final);
        assert_eq!(state.borrow_and_update().status, StreamStatus::Connected);
        assert_eq!(client.state().retry_count, 0);

        client.stop().await.unwrap();
        assert_eq!(client.state(), StreamState::default());
    }

    #[tokio::test]
    async fn dropped_connection_schedules_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();
                read_request(&mut sock).await;
                sock.write_all(RESPONSE_HEAD).await.unwrap();
                sock.write_all(b"event: connected\ndata: ok\n\n").await.unwrap();
                // Server drops the connection immediately after greeting.
            }
        });

        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let mut client = StreamClient::new(
            format!("http://{addr}/stream"),
            Duration::from_millis(20),
            100,
            events_tx,
        )
        .unwrap();
        let mut state = client.state_watch();

        client.start().unwrap();

        // Wait for at least one Reconnecting observation.
        loop {
            state.changed().await.unwrap();
            let current = state.borrow_and_update().clone();
            if current.status == StreamStatus::Reconnecting {
                assert!(current.retry_count >= 1);
                break;
            }
        }

        client.stop().await.unwrap();
        assert_eq!(client.state().status, StreamStatus::Idle);
        // Idempotent.
        client.stop().await.unwrap();
        assert_eq!(client.state().status, StreamStatus::Idle);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_failed_state() {
        // Bind then drop so the port actively refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let mut client = StreamClient::new(
            format!("http://{addr}/stream"),
            Duration::from_millis(10),
            2,
            events_tx,
        )
        .unwrap();
        let mut state = client.state_watch();

        client.start().unwrap();

        loop {
            state.changed().await.unwrap();
            let current = state.borrow_and_update().clone();
            if current.status == StreamStatus::Failed {
                assert_eq!(current.retry_count, 3);
                break;
            }
        }

        // A failed client can be started again.
        client.start().unwrap();
        client.stop().await.unwrap();
        assert_eq!(client.state().status, StreamStatus::Idle);
    }

    #[tokio::test]
    async fn malformed_payload_keeps_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_request(&mut sock).await;
            sock.write_all(RESPONSE_HEAD).await.unwrap();
            sock.write_all(b"event: connected\ndata: ok\n\n").await.unwrap();
            sock.write_all(b"event: transcription\ndata: {not json}\n\n")
                .await
                .unwrap();
            sock.write_all(
                b"event: transcription\ndata: {\"device\":\"mic\",\"isFinal\":false,\"text\":\"still here\"}\n\n",
            )
            .await
            .unwrap();
            std::future::pending::<()>().await;
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut client = StreamClient::new(
            format!("http://{addr}/stream"),
            Duration::from_millis(50),
            3,
            events_tx,
        )
        .unwrap();

        client.start().unwrap();

        let event = events_rx.recv().await.expect("later event should survive");
        assert_eq!(event.text, "still here");
        assert_eq!(client.state().status, StreamStatus::Connected);

        client.stop().await.unwrap();
    }
}
