//! End-to-end tests of the request pipeline, without the HTTP layer

use anoverif::{ProxyContext, VerifyError, VerifyResponse};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{FixedBackend, SilentBackend, fast_config, wait_until};

fn body(idval: &str) -> Vec<u8> {
    serde_json::json!({ "idval": idval }).to_string().into_bytes()
}

#[tokio::test]
async fn test_verified_identifier_returns_backend_decision() {
    let backend = FixedBackend::new(Ok(true));
    let ctx = ProxyContext::start(&fast_config(), backend.clone());

    let response = ctx.handle_body(&body("user123")).await;

    assert!(response.success);
    assert_eq!(response.result, Some(true));
    assert!(response.error.is_none());
    assert!(response.timestamp > 0);
    // Backend sees the identifier itself, never the tracking hash
    assert_eq!(backend.seen(), vec!["user123".to_string()]);
    assert!(ctx.pending().is_empty());

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_negative_decision_is_still_success() {
    let ctx = ProxyContext::start(&fast_config(), FixedBackend::new(Ok(false)));

    let response = ctx.handle_body(&body("someone")).await;

    assert!(response.success);
    assert_eq!(response.result, Some(false));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_empty_identifier_is_rejected_before_queueing() {
    let backend = FixedBackend::new(Ok(true));
    let ctx = ProxyContext::start(&fast_config(), backend.clone());

    let response = ctx.handle_body(&body("")).await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Empty 'idval' parameter"));
    assert_eq!(ctx.mixer_stats().enqueued, 0);
    assert!(ctx.cache().is_empty());
    assert_eq!(backend.calls(), 0);

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_malformed_bodies_map_to_client_errors() {
    let backend = FixedBackend::new(Ok(true));
    let ctx = ProxyContext::start(&fast_config(), backend.clone());

    let invalid = ctx.handle_body(b"{\"idval\": ").await;
    assert_eq!(invalid.error.as_deref(), Some("Invalid JSON"));

    let missing = ctx.handle_body(br#"{"id":"x"}"#).await;
    assert_eq!(
        missing.error.as_deref(),
        Some("Missing or invalid 'idval' parameter")
    );

    let wrong_type = ctx.handle_body(br#"{"idval":true}"#).await;
    assert_eq!(
        wrong_type.error.as_deref(),
        Some("Missing or invalid 'idval' parameter")
    );

    assert_eq!(backend.calls(), 0);
    assert_eq!(ctx.stats().error_total, 3);
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_silent_backend_times_out_and_clears_pending_entry() {
    let backend = SilentBackend::new();
    let ctx = ProxyContext::start(&fast_config(), backend.clone());

    let started = std::time::Instant::now();
    let response = ctx.handle_body(&body("slowpoke")).await;

    assert_eq!(response, VerifyResponse {
        timestamp: response.timestamp,
        ..VerifyResponse::failure("Request timeout")
    });
    assert!(started.elapsed() >= ctx.wait_deadline());
    assert!(ctx.pending().is_empty());
    assert_eq!(backend.calls(), 1);

    let stats = ctx.stats();
    assert_eq!(stats.timeout_total, 1);
    assert_eq!(stats.error_total, 1);

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_result_arriving_after_timeout_is_discarded() {
    // 200ms backend timeout + 100ms grace; the backend answers at 600ms
    let backend = FixedBackend::with_delay(Ok(true), Duration::from_millis(600));
    let ctx = ProxyContext::start(&fast_config(), backend.clone());

    let response = ctx.handle_body(&body("late")).await;
    assert_eq!(response.error.as_deref(), Some("Request timeout"));

    wait_until(|| ctx.mixer_stats().abandoned_writes == 1).await;
    assert_eq!(ctx.mixer_stats().completed, 0);
    assert!(ctx.pending().is_empty());

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_backend_failures_are_reported_by_category() {
    let unavailable = ProxyContext::start(
        &fast_config(),
        FixedBackend::new(Err(VerifyError::BackendUnavailable("connect".into()))),
    );
    let response = unavailable.handle_body(&body("a")).await;
    assert_eq!(response.error.as_deref(), Some("Backend API unavailable"));
    unavailable.shutdown().await;

    let protocol = ProxyContext::start(
        &fast_config(),
        FixedBackend::new(Err(VerifyError::BackendProtocol("status 500".into()))),
    );
    let response = protocol.handle_body(&body("b")).await;
    assert_eq!(response.error.as_deref(), Some("Invalid backend response"));
    protocol.shutdown().await;
}

#[tokio::test]
async fn test_every_concurrent_request_completes_exactly_once() {
    const REQUESTS: usize = 60;

    let backend = FixedBackend::new(Ok(true));
    let config = fast_config()
        .with_jitter_ms(0, 20)
        .with_backend_timeout_ms(2_000);
    let ctx = Arc::new(ProxyContext::start(&config, backend.clone()));

    let mut handles = Vec::with_capacity(REQUESTS);
    for i in 0..REQUESTS {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            ctx.handle_body(&body(&format!("user-{i}"))).await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.success, "{response:?}");
        assert_eq!(response.result, Some(true));
    }

    let mixer = ctx.mixer_stats();
    assert_eq!(mixer.enqueued, REQUESTS as u64);
    assert_eq!(mixer.completed, REQUESTS as u64);
    assert_eq!(mixer.abandoned_writes, 0);
    assert_eq!(mixer.queue_depth, 0);
    assert!(mixer.batches >= (REQUESTS as u64).div_ceil(20));
    assert_eq!(backend.calls(), REQUESTS);
    assert!(ctx.pending().is_empty());

    let stats = ctx.stats();
    assert_eq!(stats.requests_total, REQUESTS as u64);
    assert_eq!(stats.success_total, REQUESTS as u64);
    assert_eq!(stats.in_progress(), 0);

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_identifiers_in_flight_do_not_collide() {
    let backend = FixedBackend::with_delay(Ok(true), Duration::from_millis(30));
    let ctx = Arc::new(ProxyContext::start(&fast_config(), backend.clone()));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            ctx.handle_body(&body("same-person")).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().result, Some(true));
    }

    assert_eq!(backend.calls(), 5);
    // One identifier, one cached hash
    assert_eq!(ctx.cache().len(), 1);
    assert!(ctx.pending().is_empty());

    ctx.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_fails_waiting_requests() {
    let config = fast_config()
        .with_backend_timeout_ms(10_000)
        .with_timeout_grace_ms(0);
    let ctx = Arc::new(ProxyContext::start(&config, SilentBackend::new()));

    let waiting = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { ctx.handle_body(&body("stuck")).await })
    };
    wait_until(|| ctx.pending().len() == 1).await;

    ctx.shutdown().await;
    assert!(!ctx.is_running().await);

    let response = tokio::time::timeout(Duration::from_secs(2), waiting)
        .await
        .expect("handler released by shutdown")
        .unwrap();
    assert_eq!(
        response.error.as_deref(),
        Some("Processing error: server shutting down")
    );
    assert!(ctx.pending().is_empty());

    // The queue is closed now; new requests fail fast instead of hanging
    let after = ctx.handle_body(&body("late-arrival")).await;
    assert_eq!(
        after.error.as_deref(),
        Some("Processing error: mixing worker is not running")
    );
    assert!(ctx.pending().is_empty());
}

#[tokio::test]
async fn test_cancelled_handler_leaves_no_pending_entry() {
    let config = fast_config().with_backend_timeout_ms(10_000);
    let ctx = Arc::new(ProxyContext::start(&config, SilentBackend::new()));

    let handler = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { ctx.handle_body(&body("gone")).await })
    };
    wait_until(|| ctx.pending().len() == 1).await;

    // Client disconnect drops the handler future
    handler.abort();
    let _ = handler.await;

    assert!(ctx.pending().is_empty());
    ctx.shutdown().await;
}
