//! FIFO hand-off between request handlers and the mixing worker

use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;

use super::stats::MixerStats;
use super::types::PendingRequest;
use crate::error::VerifyError;

/// Submission side of the mixing queue
///
/// Cloneable; every handler holds one. Order of `submit` calls is the order in
/// which the worker drains.
#[derive(Debug, Clone)]
pub struct MixingQueue {
    sender: mpsc::UnboundedSender<PendingRequest>,
    stats: Arc<MixerStats>,
}

/// Draining side, owned by exactly one worker
#[derive(Debug)]
pub struct QueueReceiver {
    pub(super) receiver: mpsc::UnboundedReceiver<PendingRequest>,
    pub(super) stats: Arc<MixerStats>,
}

impl MixingQueue {
    /// Create a connected queue/receiver pair
    #[must_use]
    pub fn channel(stats: Arc<MixerStats>) -> (Self, QueueReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                stats: Arc::clone(&stats),
            },
            QueueReceiver { receiver, stats },
        )
    }

    /// Enqueue an accepted request
    ///
    /// # Errors
    ///
    /// `Processing` if the worker has stopped.
    pub fn submit(&self, request: PendingRequest) -> Result<(), VerifyError> {
        // Count before sending so the worker can never decrement below zero
        self.stats.queue_depth.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(request).is_err() {
            self.stats.queue_depth.fetch_sub(1, Ordering::Relaxed);
            return Err(VerifyError::Processing(
                "mixing worker is not running".to_string(),
            ));
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.stats.queue_depth.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl QueueReceiver {
    /// Wait until at least one request is queued, then take up to `limit`
    ///
    /// Returns 0 only when every sender is gone or the receiver was closed
    /// and emptied.
    pub async fn recv_batch(&mut self, batch: &mut Vec<PendingRequest>, limit: usize) -> usize {
        let received = self.receiver.recv_many(batch, limit).await;
        self.stats.queue_depth.fetch_sub(received, Ordering::Relaxed);
        received
    }

    /// Stop accepting and hand back whatever is still queued
    pub fn close_and_drain(&mut self) -> Vec<PendingRequest> {
        self.receiver.close();
        let mut rest = Vec::new();
        while let Ok(request) = self.receiver.try_recv() {
            rest.push(request);
        }
        self.stats
            .queue_depth
            .fetch_sub(rest.len(), Ordering::Relaxed);
        rest
    }
}
