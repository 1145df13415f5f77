//! Request types and constants for the mixing pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::VerifyError;
use crate::tracking::TrackingHash;

/// Maximum number of requests drained per worker wake-up
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Lower bound of the per-item jitter delay
pub const DEFAULT_JITTER_MIN_MS: u64 = 100;

/// Upper bound of the per-item jitter delay
pub const DEFAULT_JITTER_MAX_MS: u64 = 2000;

/// Extra time a handler waits beyond the backend timeout
pub const DEFAULT_TIMEOUT_GRACE_MS: u64 = 3000;

/// Terminal outcome written into a completion cell
pub type VerifyOutcome = Result<bool, VerifyError>;

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Pending-table key: the tracking hash plus a process-unique ticket
///
/// The ticket keeps two concurrent submissions of the same identifier apart;
/// each owes its own completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingKey {
    pub hash: TrackingHash,
    pub ticket: u64,
}

impl TrackingKey {
    #[must_use]
    pub fn new(hash: TrackingHash) -> Self {
        Self {
            hash,
            ticket: NEXT_TICKET.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.hash.short(), self.ticket)
    }
}

/// An accepted request travelling through the mixing queue
///
/// Its completion cell lives in the pending table under `key`.
#[derive(Debug)]
pub struct PendingRequest {
    pub key: TrackingKey,
    /// Original identifier; the only thing ever sent upstream
    pub identifier: String,
    pub created_at: Instant,
}

impl PendingRequest {
    #[must_use]
    pub fn new(key: TrackingKey, identifier: String) -> Self {
        Self {
            key,
            identifier,
            created_at: Instant::now(),
        }
    }
}

/// Per-item progress through the worker
///
/// `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Queued,
    Dequeued,
    Delayed,
    Invoking,
    Completed,
    Abandoned,
}

impl RequestStage {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}
