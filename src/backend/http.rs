//! reqwest-based backend invoker

use futures::FutureExt;
use futures::future::BoxFuture;
use log::debug;
use serde::Serialize;
use std::time::Duration;

use super::Backend;
use crate::config::ProxyConfig;
use crate::error::VerifyError;

#[derive(Serialize)]
struct BackendRequest<'a> {
    idval: &'a str,
}

/// HTTP client for the decision service
///
/// Holds one pooled `reqwest::Client`; clones of it share connections.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpBackend {
    /// Build a client with the given request and connect timeouts
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend or resolver cannot be initialized.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Build from the proxy configuration
    ///
    /// # Errors
    ///
    /// See [`HttpBackend::new`].
    pub fn from_config(config: &ProxyConfig) -> anyhow::Result<Self> {
        Self::new(
            config.backend_api_url(),
            config.backend_timeout(),
            config.connect_timeout(),
        )
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, idval: &str) -> Result<bool, VerifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&BackendRequest { idval })
            .send()
            .await
            .map_err(|e| VerifyError::BackendUnavailable(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::BackendProtocol(format!("status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| VerifyError::BackendUnavailable(describe_transport_error(&e)))?;

        parse_decision(&body)
    }
}

impl Backend for HttpBackend {
    fn verify<'a>(&'a self, idval: &'a str) -> BoxFuture<'a, Result<bool, VerifyError>> {
        self.call(idval).boxed()
    }
}

/// Extract the boolean `result` field from a backend reply
///
/// # Errors
///
/// `BackendProtocol` if the body is not JSON or `result` is missing or not a bool.
pub fn parse_decision(body: &[u8]) -> Result<bool, VerifyError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Backend body is not JSON: {e}");
        VerifyError::BackendProtocol(format!("unparsable body: {e}"))
    })?;

    value
        .get("result")
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| {
            debug!("Backend body lacks a boolean 'result' field");
            VerifyError::BackendProtocol("missing boolean 'result' field".to_string())
        })
}

/// Short category for a transport failure; never includes the request body
fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "timed out".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else if error.is_request() {
        "request error".to_string()
    } else if error.is_body() || error.is_decode() {
        "body error".to_string()
    } else {
        "transport error".to_string()
    }
}
