//! Request counters for the proxy front end

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ProxyStats {
    pub requests_total: AtomicU64,
    pub success_total: AtomicU64,
    pub error_total: AtomicU64,
    /// Subset of `error_total` that ended in "Request timeout"
    pub timeout_total: AtomicU64,
}

impl ProxyStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.success_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, timed_out: bool) {
        self.error_total.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.timeout_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ProxyStatsSnapshot {
        ProxyStatsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            success_total: self.success_total.load(Ordering::Relaxed),
            error_total: self.error_total.load(Ordering::Relaxed),
            timeout_total: self.timeout_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProxyStatsSnapshot {
    pub requests_total: u64,
    pub success_total: u64,
    pub error_total: u64,
    pub timeout_total: u64,
}

impl ProxyStatsSnapshot {
    /// Requests that have not yet produced a reply
    #[must_use]
    pub fn in_progress(&self) -> u64 {
        self.requests_total
            .saturating_sub(self.success_total + self.error_total)
    }
}
