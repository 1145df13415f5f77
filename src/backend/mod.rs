//! Upstream decision service
//!
//! The mixing worker talks to the backend through the `Backend` trait so the
//! pipeline can be driven by the real HTTP client or by an in-process stand-in.

pub mod http;

pub use http::HttpBackend;

use futures::future::BoxFuture;

use crate::error::VerifyError;

/// One verification call against the upstream service
///
/// Implementations make exactly one attempt per call and classify failures
/// into `BackendUnavailable` / `BackendProtocol`. Calls may be issued
/// concurrently without any serialization.
pub trait Backend: Send + Sync + 'static {
    /// Ask the backend whether `idval` is valid
    fn verify<'a>(&'a self, idval: &'a str) -> BoxFuture<'a, Result<bool, VerifyError>>;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn verify<'a>(&'a self, idval: &'a str) -> BoxFuture<'a, Result<bool, VerifyError>> {
        (**self).verify(idval)
    }
}
