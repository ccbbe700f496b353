//! Channel-backed event dispatcher and the observation window.

use crate::chain::{ChainError, EventBatch, EventRecord};
use crate::monitor::MonitorError;

use futures::{Stream, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why the observation window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// The full window elapsed.
    Elapsed,
    /// The shutdown signal fired first.
    Interrupted,
    /// The node stopped sending batches.
    StreamEnded,
}

impl std::fmt::Display for WindowOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Elapsed => write!(f, "window elapsed"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::StreamEnded => write!(f, "event stream ended"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowReport {
    pub outcome: WindowOutcome,
    /// Batches handed to the handler.
    pub batches: u64,
    pub elapsed: Duration,
}

/// An active subscription. Dropping it stops the producer at once; the
/// consumer still handles whatever was already queued.
pub struct Subscription {
    shutdown_tx: watch::Sender<bool>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<Result<u64, MonitorError>>,
}

/// Register `handler` against a stream of event batches.
///
/// Returns as soon as the tasks are spawned. A producer task moves batches
/// from the stream onto an unbounded channel; a single consumer task calls
/// `handler` once per batch, in delivery order. The first stream error or
/// handler error stops the consumer and is reported by `run_for` /
/// `shutdown`.
pub fn subscribe<S, H>(batches: S, mut handler: H) -> Subscription
where
    S: Stream<Item = Result<EventBatch, ChainError>> + Send + 'static,
    H: FnMut(&[EventRecord]) -> Result<(), MonitorError> + Send + 'static,
{
    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel::<Result<EventBatch, ChainError>>();
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let producer = tokio::spawn(async move {
        let mut batches = Box::pin(batches);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    debug!("event producer shutting down");
                    break;
                }
                next = batches.next() => match next {
                    Some(item) => {
                        let failed = item.is_err();
                        if batch_tx.send(item).is_err() || failed {
                            break;
                        }
                    }
                    None => {
                        info!("event stream ended");
                        break;
                    }
                }
            }
        }
    });

    let consumer = tokio::spawn(async move {
        let mut handled: u64 = 0;
        while let Some(item) = batch_rx.recv().await {
            let batch = item?;
            handler(batch.as_slice())?;
            handled += 1;
        }
        Ok::<u64, MonitorError>(handled)
    });

    Subscription {
        shutdown_tx,
        producer,
        consumer,
    }
}

impl Subscription {
    /// Keep dispatching for `window`, or until `shutdown` resolves, or until
    /// the stream ends. The dispatcher is stopped before returning; batches
    /// already queued are still handled.
    pub async fn run_for<F>(mut self, window: Duration, shutdown: F) -> Result<WindowReport, MonitorError>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        info!(window_secs = window.as_secs(), "monitoring events");

        let outcome = tokio::select! {
            _ = tokio::time::sleep(window) => WindowOutcome::Elapsed,
            _ = shutdown => WindowOutcome::Interrupted,
            joined = &mut self.consumer => {
                self.producer.abort();
                let batches = joined??;
                warn!(batches = batches, "event stream ended before the window elapsed");
                return Ok(WindowReport {
                    outcome: WindowOutcome::StreamEnded,
                    batches,
                    elapsed: started.elapsed(),
                });
            }
        };

        let batches = self.shutdown().await?;
        Ok(WindowReport {
            outcome,
            batches,
            elapsed: started.elapsed(),
        })
    }

    /// Stop reading the stream and wait for queued batches to be handled.
    /// Returns the number of batches handled.
    pub async fn shutdown(self) -> Result<u64, MonitorError> {
        let _ = self.shutdown_tx.send(true);
        self.producer.await?;
        self.consumer.await?
    }
}
