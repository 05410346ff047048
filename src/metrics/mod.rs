mod types;

pub use types::MetricsSnapshot;

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Rate-limited publisher for [`MetricsSnapshot`] values.
///
/// The tick path calls [`maybe_publish`](Self::maybe_publish) every frame;
/// a snapshot is only built and broadcast when the configured interval has
/// elapsed, keeping high-frequency tracking decoupled from lower-frequency
/// consumers.
pub struct MetricsPublisher {
    tx: watch::Sender<MetricsSnapshot>,
    interval: Duration,
    last_published: Option<Instant>,
}

impl MetricsPublisher {
    pub fn new(interval: Duration) -> Self {
        let (tx, _) = watch::channel(MetricsSnapshot::default());
        Self {
            tx,
            interval,
            last_published: None,
        }
    }

    /// Publish a fresh snapshot if the publish interval has elapsed. The
    /// snapshot is built lazily so skipped ticks cost nothing.
    pub fn maybe_publish<F>(&mut self, build: F) -> bool
    where
        F: FnOnce() -> MetricsSnapshot,
    {
        let now = Instant::now();
        if let Some(last) = self.last_published {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_published = Some(now);
        let _ = self.tx.send(build());
        true
    }

    /// Publish unconditionally. Used at teardown so the final flushed
    /// durations are always visible to consumers.
    pub fn publish_now(&mut self, snapshot: MetricsSnapshot) {
        self.last_published = Some(Instant::now());
        let _ = self.tx.send(snapshot);
    }

    pub fn subscribe(&self) -> watch::Receiver<MetricsSnapshot> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> MetricsSnapshot {
        self.tx.borrow().clone()
    }
}
