//! Unit tests for the mixing worker
//!
//! These drive the worker directly through its queue, without the proxy
//! context in front of it.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use super::*;
use crate::error::VerifyError;
use crate::tracking::salted_digest;

/// Backend that answers `true` after a fixed delay and counts calls
struct CountingBackend {
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingBackend {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

impl Backend for CountingBackend {
    fn verify<'a>(&'a self, _idval: &'a str) -> BoxFuture<'a, Result<bool, VerifyError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(true)
        }
        .boxed()
    }
}

/// Backend that panics, either while building its future or while polling it
struct PanickingBackend {
    eager: bool,
}

impl Backend for PanickingBackend {
    fn verify<'a>(&'a self, _idval: &'a str) -> BoxFuture<'a, Result<bool, VerifyError>> {
        assert!(!self.eager, "backend exploded before returning");
        async move { panic!("backend exploded mid-call") }.boxed()
    }
}

fn submit(
    queue: &MixingQueue,
    pending: &PendingTable,
    id: &str,
) -> (TrackingKey, CompletionWaiter) {
    let key = TrackingKey::new(salted_digest("test-salt", id));
    let (cell, waiter) = CompletionCell::new();
    assert!(pending.register(key.clone(), cell));
    queue
        .submit(PendingRequest::new(key.clone(), id.to_string()))
        .expect("worker queue open");
    (key, waiter)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_21_queued_items_drain_in_two_waves() {
    let stats = Arc::new(MixerStats::new());
    let pending = Arc::new(PendingTable::new());
    let backend = CountingBackend::new(Duration::ZERO);
    let (queue, receiver) = MixingQueue::channel(Arc::clone(&stats));

    // Fill the queue while no worker is running
    let mut waiters = Vec::new();
    for i in 0..21 {
        waiters.push(submit(&queue, &pending, &format!("id-{i}")).1);
    }
    assert_eq!(queue.depth(), 21);

    let (wave_tx, mut wave_rx) = mpsc::unbounded_channel();
    let handle = MixingWorker::new(
        receiver,
        backend.clone(),
        Arc::clone(&pending),
        MixerConfig {
            batch_size: 20,
            jitter: Jitter::none(),
        },
    )
    .with_wave_observer(wave_tx)
    .spawn();

    assert_eq!(wave_rx.recv().await, Some(20));
    assert_eq!(wave_rx.recv().await, Some(1));

    for mut waiter in waiters {
        assert_eq!(waiter.wait(Duration::from_secs(2)).await, Some(Ok(true)));
    }
    assert!(pending.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 21);

    handle.shutdown().await;
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.batches, 2);
    assert_eq!(snapshot.dispatched, 21);
    assert_eq!(snapshot.completed, 21);
    assert_eq!(snapshot.queue_depth, 0);
}

#[tokio::test]
async fn test_late_result_after_abandon_is_discarded() {
    let stats = Arc::new(MixerStats::new());
    let pending = Arc::new(PendingTable::new());
    let backend = CountingBackend::new(Duration::from_millis(50));
    let (queue, handle) = start(
        backend.clone(),
        Arc::clone(&pending),
        MixerConfig {
            batch_size: 20,
            jitter: Jitter::none(),
        },
        Arc::clone(&stats),
    );

    let (key, _waiter) = submit(&queue, &pending, "slow");
    assert!(pending.abandon(&key));
    assert!(pending.is_empty());

    wait_until(|| stats.snapshot().abandoned_writes == 1).await;
    assert_eq!(stats.snapshot().completed, 0);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_fails_requests_still_owed_a_completion() {
    let stats = Arc::new(MixerStats::new());
    let pending = Arc::new(PendingTable::new());
    let backend = CountingBackend::new(Duration::ZERO);
    let (queue, handle) = start(
        backend.clone(),
        Arc::clone(&pending),
        MixerConfig {
            batch_size: 20,
            jitter: Jitter::from_millis(10_000, 10_000),
        },
        Arc::clone(&stats),
    );

    let mut waiters: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| submit(&queue, &pending, id).1)
        .collect();
    wait_until(|| stats.snapshot().dispatched == 3).await;

    handle.shutdown().await;
    assert!(!handle.is_running().await);
    assert!(pending.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    for waiter in &mut waiters {
        assert!(matches!(
            waiter.wait(Duration::from_secs(1)).await,
            Some(Err(VerifyError::Processing(_)))
        ));
    }

    // Queue is closed once the worker is gone
    let (cell, _w) = CompletionCell::new();
    let key = TrackingKey::new(salted_digest("test-salt", "late"));
    pending.register(key.clone(), cell);
    assert!(queue.submit(PendingRequest::new(key, "late".into())).is_err());
}

#[tokio::test]
async fn test_jitter_spreads_completion_order() {
    let stats = Arc::new(MixerStats::new());
    let pending = Arc::new(PendingTable::new());
    let backend = CountingBackend::new(Duration::ZERO);
    let (queue, handle) = start(
        backend,
        Arc::clone(&pending),
        MixerConfig {
            batch_size: 20,
            jitter: Jitter::from_millis(0, 200),
        },
        Arc::clone(&stats),
    );

    let started = tokio::time::Instant::now();
    let waiters: Vec<_> = (0..10)
        .map(|i| submit(&queue, &pending, &format!("order-{i}")).1)
        .collect();

    // Record when each request finishes, in submission order
    let finished = futures::future::join_all(waiters.into_iter().map(|mut w| async move {
        let outcome = w.wait(Duration::from_secs(2)).await;
        (outcome, started.elapsed())
    }))
    .await;

    let elapsed: Vec<_> = finished
        .iter()
        .map(|(outcome, at)| {
            assert_eq!(outcome, &Some(Ok(true)));
            *at
        })
        .collect();
    let mut sorted = elapsed.clone();
    sorted.sort();
    // Ten independent 0-200ms delays landing in submission order is ~1/3.6M
    assert_ne!(elapsed, sorted, "completion order should not mirror arrival order");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_backend_panic_completes_request_with_processing_error() {
    for eager in [false, true] {
        let stats = Arc::new(MixerStats::new());
        let pending = Arc::new(PendingTable::new());
        let (queue, handle) = start(
            Arc::new(PanickingBackend { eager }),
            Arc::clone(&pending),
            MixerConfig {
                batch_size: 20,
                jitter: Jitter::none(),
            },
            Arc::clone(&stats),
        );

        let (_key, mut waiter) = submit(&queue, &pending, "boom");
        let started = tokio::time::Instant::now();
        let outcome = waiter.wait(Duration::from_secs(2)).await;

        assert!(
            matches!(outcome, Some(Err(VerifyError::Processing(ref msg))) if msg.contains("exploded")),
            "eager={eager}: {outcome:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(pending.is_empty());
        wait_until(|| stats.snapshot().completed == 1).await;

        // The worker survives and keeps draining
        assert!(handle.is_running().await);
        handle.shutdown().await;
    }
}
