/// Interception and batching layer.
///
/// Decides which exchanges qualify for recording and accumulates
/// qualifying exchanges in an in-memory queue that flushes as one
/// batched anchor, on a size threshold or a recurring timer. Flushing
/// is best-effort: a failed flush is logged and abandoned, never
/// retried, and never propagates into request handling.
pub mod middleware;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::ledger::Visibility;
use crate::record::{Exchange, Recorder};

/// Default flush interval when none is configured.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(60);

/// Path filter deciding whether an exchange qualifies for recording.
///
/// Exclude patterns are checked first; any match vetoes. Then include
/// patterns: if any are configured only a match proceeds, otherwise
/// everything not excluded proceeds. Patterns support a single `*`
/// wildcard with prefix/suffix semantics, not full glob syntax.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl RecordFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn should_record(&self, path: &str) -> bool {
        if self.exclude.iter().any(|p| matches_pattern(p, path)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| matches_pattern(p, path))
    }
}

fn matches_pattern(pattern: &str, path: &str) -> bool {
    match pattern.find('*') {
        Some(pos) => {
            let prefix = &pattern[..pos];
            let suffix = &pattern[pos + 1..];
            path.len() >= prefix.len() + suffix.len()
                && path.starts_with(prefix)
                && path.ends_with(suffix)
        }
        None => path == pattern,
    }
}

/// Where a drained batch goes. Injected so tests substitute fakes.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn submit(&self, exchanges: Vec<Exchange>) -> Result<()>;
}

/// Production sink: anchors the batch through a `Recorder`.
pub struct RecorderSink {
    pub recorder: Arc<Recorder>,
    pub visibility: Option<Visibility>,
}

#[async_trait]
impl BatchSink for RecorderSink {
    async fn submit(&self, exchanges: Vec<Exchange>) -> Result<()> {
        self.recorder
            .record_batch(&exchanges, self.visibility)
            .await
            .map(|_| ())
    }
}

/// A queued exchange awaiting flush.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub exchange: Exchange,
    pub captured_at: DateTime<Utc>,
}

struct TimerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Bounded-trigger batch queue.
///
/// Flushes when the queue reaches `batch_size` or on every timer tick.
/// The drain swaps the queue for an empty one before any await, so
/// appends arriving during the asynchronous submit land in the fresh
/// queue — never double-flushed, never dropped by the swap.
pub struct Batcher {
    sink: Arc<dyn BatchSink>,
    batch_size: usize,
    interval: Duration,
    queue: Mutex<Vec<QueueEntry>>,
    timer: Mutex<Option<TimerHandle>>,
}

impl Batcher {
    pub fn new(sink: Arc<dyn BatchSink>, batch_size: usize, interval: Duration) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
            interval,
            queue: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
        }
    }

    /// Number of entries currently queued.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Append an exchange; flushes inline when the size threshold is hit.
    pub async fn push(&self, exchange: Exchange) {
        let reached_threshold = {
            let mut queue = self.queue.lock().unwrap();
            queue.push(QueueEntry {
                exchange,
                captured_at: Utc::now(),
            });
            queue.len() >= self.batch_size
        };

        if reached_threshold {
            debug!(threshold = self.batch_size, "Queue reached batch size");
            self.flush().await;
        }
    }

    /// Drain the queue and submit it as one batch.
    ///
    /// An empty queue is a no-op. On failure the drained entries are
    /// dropped: accepted data loss on this best-effort path, logged
    /// with the number of lost entries.
    pub async fn flush(&self) {
        let entries = std::mem::take(&mut *self.queue.lock().unwrap());
        if entries.is_empty() {
            return;
        }

        let count = entries.len();
        let exchanges = entries.into_iter().map(|e| e.exchange).collect();
        match self.sink.submit(exchanges).await {
            Ok(()) => info!(count, "Batch flush complete"),
            Err(e) => error!(count, error = %e, "Batch flush failed, entries dropped"),
        }
    }

    /// Start the recurring flush timer. Idempotent while running.
    pub fn start(self: &Arc<Self>) {
        let mut timer = self.timer.lock().unwrap();
        if timer.is_some() {
            return;
        }

        let (stop, mut stopped) = watch::channel(false);
        let batcher = Arc::clone(self);
        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => batcher.flush().await,
                    _ = stopped.changed() => break,
                }
            }
        });
        *timer = Some(TimerHandle { stop, task });
    }

    /// Stop the timer deterministically and flush what remains.
    pub async fn shutdown(&self) {
        let handle = self.timer.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.stop.send(true);
            let _ = handle.task.await;
        }
        self.flush().await;
    }
}
