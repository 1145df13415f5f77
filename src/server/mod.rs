//! HTTP surface
//!
//! `POST /verify` runs a request through [`ProxyContext::handle_body`].
//! `OPTIONS` on any path answers the CORS preflight. Everything else is 404.
//! A body that cannot be read within [`MAX_BODY_BYTES`] is answered like
//! malformed JSON.

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State, rejection::BytesRejection},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
};
use log::{debug, error, info};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::VerifyError;
use crate::proxy::ProxyContext;
use crate::response::VerifyResponse;

/// Path of the single verification endpoint
pub const VERIFY_PATH: &str = "/verify";

/// Largest request body read before the request is rejected
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

#[derive(Clone)]
struct AppState {
    ctx: Arc<ProxyContext>,
    permits: Arc<Semaphore>,
}

/// Build the router for `ctx`
pub fn router(ctx: Arc<ProxyContext>) -> Router {
    build_router(ctx, MAX_BODY_BYTES)
}

fn build_router(ctx: Arc<ProxyContext>, body_limit: usize) -> Router {
    let permits = ctx.max_connections().clamp(1, Semaphore::MAX_PERMITS);
    let state = AppState {
        ctx,
        permits: Arc::new(Semaphore::new(permits)),
    };

    Router::new()
        .route(VERIFY_PATH, any(verify_route))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            limit_concurrency,
        ))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain open requests
///
/// # Errors
///
/// Returns an error if accepting connections fails.
pub async fn serve<F>(
    listener: TcpListener,
    ctx: Arc<ProxyContext>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{addr}{VERIFY_PATH}");
    }
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn limit_concurrency(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Ok(_permit) = state.permits.acquire().await else {
        error!("Connection semaphore closed");
        return json_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            VerifyResponse::failure("Service unavailable").to_json(),
        );
    };
    next.run(request).await
}

async fn verify_route(
    State(state): State<AppState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match method {
        Method::POST => {
            let response = match body {
                Ok(body) => state.ctx.handle_body(&body).await,
                Err(rejection) => {
                    debug!("Unreadable request body: {rejection}");
                    state.ctx.reject(VerifyError::InvalidJson)
                }
            };
            let mut reply = json_reply(StatusCode::OK, response.to_json());
            add_cors_headers(reply.headers_mut());
            reply
        }
        Method::OPTIONS => preflight(),
        _ => not_found(),
    }
}

async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        preflight()
    } else {
        not_found()
    }
}

fn preflight() -> Response {
    let mut reply = StatusCode::OK.into_response();
    let headers = reply.headers_mut();
    add_cors_headers(headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
    );
    reply
}

fn not_found() -> Response {
    let mut reply = json_reply(
        StatusCode::NOT_FOUND,
        VerifyResponse::failure("Not Found").to_json(),
    );
    reply.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    reply
}

fn json_reply(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}
