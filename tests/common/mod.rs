//! Test utilities shared by the anoverif integration tests

#![allow(dead_code)]

use anoverif::{Backend, ProxyConfig, VerifyError};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Backend that always answers with the same decision
pub struct FixedBackend {
    result: Result<bool, VerifyError>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FixedBackend {
    pub fn new(result: Result<bool, VerifyError>) -> Arc<Self> {
        Self::with_delay(result, Duration::ZERO)
    }

    pub fn with_delay(result: Result<bool, VerifyError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result,
            delay,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Identifiers received, in call order
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Backend for FixedBackend {
    fn verify<'a>(&'a self, idval: &'a str) -> BoxFuture<'a, Result<bool, VerifyError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(idval.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.result.clone()
        }
        .boxed()
    }
}

/// Backend whose calls never finish
pub struct SilentBackend {
    calls: AtomicUsize,
}

impl SilentBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Backend for SilentBackend {
    fn verify<'a>(&'a self, _idval: &'a str) -> BoxFuture<'a, Result<bool, VerifyError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        futures::future::pending().boxed()
    }
}

/// Config with no jitter and short timeouts, suitable for fast tests
pub fn fast_config() -> ProxyConfig {
    ProxyConfig::default()
        .with_hash_salt("integration-salt")
        .with_jitter_ms(0, 0)
        .with_backend_timeout_ms(200)
        .with_timeout_grace_ms(100)
}

/// Poll `condition` every 10ms for up to 2s
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}
