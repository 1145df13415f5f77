//! Lock-free counters for the mixing pipeline

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MixerStats {
    pub enqueued: AtomicU64,
    pub batches: AtomicU64,
    pub dispatched: AtomicU64,
    pub completed: AtomicU64,
    /// Worker results discarded because the handler had already timed out
    pub abandoned_writes: AtomicU64,
    pub queue_depth: AtomicUsize,
}

impl MixerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MixerStatsSnapshot {
        MixerStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            abandoned_writes: self.abandoned_writes.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerStatsSnapshot {
    pub enqueued: u64,
    pub batches: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub abandoned_writes: u64,
    pub queue_depth: usize,
}
