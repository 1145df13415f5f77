//! Background mixing worker
//!
//! A single loop owns the queue receiver. It sleeps until something is queued,
//! drains at most `batch_size` requests in FIFO order, and fans each one out
//! to its own task that sleeps for an independent random delay before calling
//! the backend. Drain order is FIFO; completion order is deliberately not.

use futures::FutureExt;
use log::{debug, error, info};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

use super::jitter::Jitter;
use super::pending::PendingTable;
use super::queue::QueueReceiver;
use super::stats::MixerStats;
use super::types::{DEFAULT_BATCH_SIZE, PendingRequest, RequestStage, TrackingKey};
use crate::backend::Backend;
use crate::error::VerifyError;

/// Worker tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerConfig {
    pub batch_size: usize,
    pub jitter: Jitter,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            jitter: Jitter::default(),
        }
    }
}

pub struct MixingWorker {
    queue: QueueReceiver,
    backend: Arc<dyn Backend>,
    pending: Arc<PendingTable>,
    config: MixerConfig,
    stats: Arc<MixerStats>,
    wave_observer: Option<mpsc::UnboundedSender<usize>>,
}

impl MixingWorker {
    #[must_use]
    pub fn new(
        queue: QueueReceiver,
        backend: Arc<dyn Backend>,
        pending: Arc<PendingTable>,
        config: MixerConfig,
    ) -> Self {
        let stats = Arc::clone(&queue.stats);
        Self {
            queue,
            backend,
            pending,
            config,
            stats,
            wave_observer: None,
        }
    }

    /// Report the size of every drained batch to `observer`
    #[must_use]
    pub fn with_wave_observer(mut self, observer: mpsc::UnboundedSender<usize>) -> Self {
        self.wave_observer = Some(observer);
        self
    }

    /// Start the loop on the current tokio runtime
    pub fn spawn(self) -> MixerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        MixerHandle {
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Self {
            mut queue,
            backend,
            pending,
            config,
            stats,
            wave_observer,
        } = self;

        let batch_size = config.batch_size.max(1);
        let mut batch: Vec<PendingRequest> = Vec::with_capacity(batch_size);
        let mut in_flight: JoinSet<()> = JoinSet::new();

        info!(
            "Mixing worker started (batch size {batch_size}, jitter {:?}..={:?})",
            config.jitter.min(),
            config.jitter.max()
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait_for(|stop| *stop) => break,

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Dispatch task panicked: {e}");
                        }
                    }
                }

                received = queue.recv_batch(&mut batch, batch_size) => {
                    if received == 0 {
                        // Every queue handle dropped
                        break;
                    }

                    stats.batches.fetch_add(1, Ordering::Relaxed);
                    if let Some(observer) = &wave_observer {
                        let _ = observer.send(received);
                    }
                    debug!("Drained batch of {received} ({} still queued)", queue_depth(&stats));

                    for request in batch.drain(..) {
                        log_stage(&request.key, RequestStage::Dequeued);
                        let delay = config.jitter.sample();
                        in_flight.spawn(dispatch(
                            request,
                            delay,
                            Arc::clone(&backend),
                            Arc::clone(&pending),
                            Arc::clone(&stats),
                        ));
                        stats.dispatched.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        let aborted = in_flight.len();
        in_flight.shutdown().await;

        let error = VerifyError::Processing("server shutting down".to_string());
        let stranded = queue.close_and_drain();
        for request in &stranded {
            pending.complete(&request.key, Err(error.clone()));
        }
        let failed = pending.fail_all(&error);

        info!(
            "Mixing worker stopped ({aborted} in-flight aborted, {} queued and {failed} pending failed)",
            stranded.len()
        );
    }
}

/// Jitter, invoke, complete: one request's life after leaving the queue
async fn dispatch(
    request: PendingRequest,
    delay: Duration,
    backend: Arc<dyn Backend>,
    pending: Arc<PendingTable>,
    stats: Arc<MixerStats>,
) {
    let PendingRequest {
        key,
        identifier,
        created_at,
    } = request;

    log_stage(&key, RequestStage::Delayed);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    log_stage(&key, RequestStage::Invoking);
    // A panicking backend still owes this request its completion
    let outcome = AssertUnwindSafe(async { backend.verify(&identifier).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            error!("{key}: backend call panicked");
            Err(VerifyError::from_panic(&*panic))
        });
    drop(identifier);

    if pending.complete(&key, outcome) {
        stats.completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            "{key}: {:?} after {:?} (jitter {delay:?})",
            RequestStage::Completed,
            created_at.elapsed()
        );
    } else {
        stats.abandoned_writes.fetch_add(1, Ordering::Relaxed);
        debug!("{key}: {:?}, late result discarded", RequestStage::Abandoned);
    }
}

#[inline]
fn log_stage(key: &TrackingKey, stage: RequestStage) {
    debug!("{key}: {stage:?}");
}

#[inline]
fn queue_depth(stats: &MixerStats) -> usize {
    stats.queue_depth.load(Ordering::Relaxed)
}

/// Owner handle for a running worker
#[derive(Debug)]
pub struct MixerHandle {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MixerHandle {
    /// Stop the worker and wait for it to finish
    ///
    /// In-flight dispatches are aborted and every request still owed a
    /// completion is failed. Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Mixing worker terminated abnormally: {e}");
            }
        }
    }

    /// Whether the worker task is still alive
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
