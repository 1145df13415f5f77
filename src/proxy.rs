//! Request front end
//!
//! `ProxyContext` owns the hasher, the pending table and the mixing worker.
//! Each client request is validated, hashed, registered, queued, and then the
//! handler parks on its completion cell until the worker writes an outcome or
//! the wait deadline passes.

use futures::FutureExt;
use log::{debug, error, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::Backend;
use crate::config::ProxyConfig;
use crate::error::{VerifyError, VerifyResult};
use crate::mixing::{
    self, CompletionCell, CompletionWaiter, MixerHandle, MixerStats, MixerStatsSnapshot, MixingQueue,
    PendingRequest, PendingTable, TrackingKey, VerifyOutcome,
};
use crate::response::VerifyResponse;
use crate::stats::{ProxyStats, ProxyStatsSnapshot};
use crate::tracking::{HashCache, TrackingHasher};

/// Shared state behind every request handler
pub struct ProxyContext {
    hasher: TrackingHasher,
    pending: Arc<PendingTable>,
    queue: MixingQueue,
    mixer: MixerHandle,
    mixer_stats: Arc<MixerStats>,
    stats: ProxyStats,
    wait_deadline: Duration,
    max_connections: usize,
}

impl ProxyContext {
    /// Build the pipeline and start its worker
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(config: &ProxyConfig, backend: Arc<dyn Backend>) -> Self {
        let cache = HashCache::new(config.cache_max_entries(), config.cache_evict_chunk());
        let hasher = TrackingHasher::new(config.hash_salt(), cache);
        let pending = Arc::new(PendingTable::new());
        let mixer_stats = Arc::new(MixerStats::new());
        let (queue, mixer) = mixing::start(
            backend,
            Arc::clone(&pending),
            config.mixer_config(),
            Arc::clone(&mixer_stats),
        );

        if config.hash_salt().is_empty() {
            warn!("hash_salt is empty; tracking hashes are plain SHA-256 of the identifier");
        }
        info!(
            "Proxy context ready (wait deadline {:?}, cache {} entries)",
            config.wait_deadline(),
            config.cache_max_entries()
        );

        Self {
            hasher,
            pending,
            queue,
            mixer,
            mixer_stats,
            stats: ProxyStats::new(),
            wait_deadline: config.wait_deadline(),
            max_connections: config.max_connections(),
        }
    }

    /// Validate a request body and extract its identifier
    ///
    /// # Errors
    ///
    /// `InvalidJson` if the body does not parse, `MissingIdval` if `idval` is
    /// absent or not a string, `EmptyIdval` if it is the empty string.
    pub fn parse_request(body: &[u8]) -> VerifyResult<String> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|_| VerifyError::InvalidJson)?;
        let idval = value
            .get("idval")
            .and_then(serde_json::Value::as_str)
            .ok_or(VerifyError::MissingIdval)?;
        if idval.is_empty() {
            return Err(VerifyError::EmptyIdval);
        }
        Ok(idval.to_string())
    }

    /// Run one identifier through the mixing pipeline
    ///
    /// Returns exactly one outcome: the backend decision or failure written by
    /// the worker, or `Timeout` if this handler won the race to abandon.
    pub async fn verify(&self, identifier: String) -> VerifyOutcome {
        let key = TrackingKey::new(self.hasher.hash(&identifier));
        let (cell, mut waiter) = CompletionCell::new();
        if !self.pending.register(key.clone(), cell) {
            return Err(VerifyError::Processing("tracking key collision".to_string()));
        }

        // Drops the table entry if this future is cancelled mid-wait
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            key: key.clone(),
        };

        self.queue
            .submit(PendingRequest::new(key.clone(), identifier))?;
        debug!("{key}: queued");

        if let Some(outcome) = waiter.wait(self.wait_deadline).await {
            return outcome;
        }
        settle_after_deadline(&self.pending, &key, waiter, self.wait_deadline).await
    }

    /// Full request path: parse, verify, count, render
    ///
    /// Panics inside the pipeline are caught here and reported as a
    /// processing error for this request only.
    pub async fn handle_body(&self, body: &[u8]) -> VerifyResponse {
        self.stats.record_request();

        let outcome = AssertUnwindSafe(self.process(body))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(VerifyError::from_panic(&*panic)));
        self.finish(outcome)
    }

    /// Answer a request whose body could not be read at all
    pub fn reject(&self, error: VerifyError) -> VerifyResponse {
        self.stats.record_request();
        self.finish(Err(error))
    }

    fn finish(&self, outcome: VerifyOutcome) -> VerifyResponse {
        match &outcome {
            Ok(_) => self.stats.record_success(),
            Err(e) => {
                self.stats.record_error(matches!(e, VerifyError::Timeout));
                log_failure(e);
            }
        }
        VerifyResponse::from(outcome)
    }

    async fn process(&self, body: &[u8]) -> VerifyOutcome {
        let identifier = Self::parse_request(body)?;
        self.verify(identifier).await
    }

    /// Stop the mixing worker; requests still waiting receive a processing error
    pub async fn shutdown(&self) {
        self.mixer.shutdown().await;
    }

    pub async fn is_running(&self) -> bool {
        self.mixer.is_running().await
    }

    #[must_use]
    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    #[must_use]
    pub fn cache(&self) -> &HashCache {
        self.hasher.cache()
    }

    #[must_use]
    pub fn stats(&self) -> ProxyStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn mixer_stats(&self) -> MixerStatsSnapshot {
        self.mixer_stats.snapshot()
    }

    #[must_use]
    pub fn wait_deadline(&self) -> Duration {
        self.wait_deadline
    }

    /// Upper bound on concurrently handled client requests
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

struct PendingGuard {
    pending: Arc<PendingTable>,
    key: TrackingKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        // No-op once the entry has been removed by either side
        self.pending.abandon(&self.key);
    }
}

/// Race the worker for the table entry once the wait deadline has passed
///
/// Removing the entry decides the outcome. If the worker removed it first its
/// write already reached the cell, so the waiter resolves without blocking.
async fn settle_after_deadline(
    pending: &PendingTable,
    key: &TrackingKey,
    waiter: CompletionWaiter,
    deadline: Duration,
) -> VerifyOutcome {
    if pending.abandon(key) {
        warn!("{key}: no completion within {deadline:?}");
        Err(VerifyError::Timeout)
    } else {
        debug!("{key}: lost timeout race, taking worker result");
        waiter.recv().await
    }
}

fn log_failure(error: &VerifyError) {
    match error {
        e if e.is_client_error() => debug!("Rejected request: {e}"),
        e if e.is_backend_error() => warn!("Backend failure: {e}"),
        VerifyError::Timeout => {}
        e => error!("Request failed: {e}"),
    }
}
