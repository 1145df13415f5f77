//! Request-mixing pipeline
//!
//! Decouples the order and timing of client requests from the order and
//! timing of backend calls, so that watching both sides of the proxy does not
//! let an observer pair an inbound request with its outbound call.
//!
//! # Architecture
//!
//! - `types` - request/key types, stage enum, defaults
//! - `cell` - single-use completion cell with an explicit state tag
//! - `pending` - registry of requests still owed a completion
//! - `queue` - FIFO hand-off from handlers to the worker
//! - `jitter` - uniform random per-item delay
//! - `worker` - batch-draining loop and per-item dispatch tasks
//! - `stats` - lock-free counters
//!
//! Handlers register in the pending table *before* enqueueing. Whichever path
//! removes the table entry first (worker completion or handler timeout) owns
//! the request's single terminal transition.

mod cell;
mod jitter;
mod pending;
mod queue;
mod stats;
mod types;
mod worker;

pub use cell::{CellState, CompletionCell, CompletionWaiter};
pub use jitter::Jitter;
pub use pending::PendingTable;
pub use queue::{MixingQueue, QueueReceiver};
pub use stats::{MixerStats, MixerStatsSnapshot};
pub use types::{
    DEFAULT_BATCH_SIZE, DEFAULT_JITTER_MAX_MS, DEFAULT_JITTER_MIN_MS, DEFAULT_TIMEOUT_GRACE_MS,
    PendingRequest, RequestStage, TrackingKey, VerifyOutcome,
};
pub use worker::{MixerConfig, MixerHandle, MixingWorker};

use std::sync::Arc;

use crate::backend::Backend;

/// Create the queue and start a worker draining it
#[must_use]
pub fn start(
    backend: Arc<dyn Backend>,
    pending: Arc<PendingTable>,
    config: MixerConfig,
    stats: Arc<MixerStats>,
) -> (MixingQueue, MixerHandle) {
    let (queue, receiver) = MixingQueue::channel(stats);
    let handle = MixingWorker::new(receiver, backend, pending, config).spawn();
    (queue, handle)
}

#[cfg(test)]
mod tests;
