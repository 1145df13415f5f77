//! Error taxonomy for verification requests
//!
//! Every failure a request can hit is terminal and ends up as a structured JSON
//! payload on the wire. Nothing in here is allowed to take the process down.

use std::any::Any;
use thiserror::Error;

/// Result type alias for verification operations
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Terminal failure of a single verification request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Request body was not valid JSON
    #[error("Invalid JSON")]
    InvalidJson,

    /// `idval` absent or not a string
    #[error("Missing or invalid 'idval' parameter")]
    MissingIdval,

    /// `idval` present but empty
    #[error("Empty 'idval' parameter")]
    EmptyIdval,

    /// Transport-level failure reaching the backend (connect, timeout, DNS)
    #[error("Backend API unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend answered, but not with something we understand
    #[error("Invalid backend response: {0}")]
    BackendProtocol(String),

    /// No completion arrived within the bounded wait
    #[error("Request timeout")]
    Timeout,

    /// Internal fault caught at the request-processing boundary
    #[error("Processing error: {0}")]
    Processing(String),
}

impl VerifyError {
    /// Message sent to the client in the `error` field.
    ///
    /// Backend details stay in the logs; the client only learns the category.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidJson | Self::MissingIdval | Self::EmptyIdval | Self::Timeout => {
                self.to_string()
            }
            Self::BackendUnavailable(_) => "Backend API unavailable".to_string(),
            Self::BackendProtocol(_) => "Invalid backend response".to_string(),
            Self::Processing(detail) => format!("Processing error: {detail}"),
        }
    }

    /// Rejected before any hashing or queueing took place
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidJson | Self::MissingIdval | Self::EmptyIdval)
    }

    /// Failure attributable to the upstream decision service
    #[must_use]
    pub const fn is_backend_error(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::BackendProtocol(_))
    }

    /// Processing error carrying a caught panic's message
    #[must_use]
    pub fn from_panic(panic: &(dyn Any + Send)) -> Self {
        let detail = if let Some(s) = panic.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unexpected panic".to_string()
        };
        Self::Processing(detail)
    }
}
