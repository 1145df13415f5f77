//! Wire payloads returned to clients

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Current time as unix seconds
#[inline]
#[must_use]
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// JSON body of every `/verify` reply
///
/// Success carries `result`, failure carries `error`; both carry `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub timestamp: i64,
}

impl VerifyResponse {
    #[must_use]
    pub fn verified(result: bool) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            timestamp: unix_timestamp(),
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
            timestamp: unix_timestamp(),
        }
    }

    /// Serialize to the JSON wire form
    #[must_use]
    pub fn to_json(&self) -> String {
        // Only bools, strings and integers: serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"success":false,"error":"Processing error","timestamp":{}}}"#,
                self.timestamp
            )
        })
    }
}

impl From<&VerifyError> for VerifyResponse {
    fn from(error: &VerifyError) -> Self {
        Self::failure(error.client_message())
    }
}

impl From<Result<bool, VerifyError>> for VerifyResponse {
    fn from(outcome: Result<bool, VerifyError>) -> Self {
        match outcome {
            Ok(result) => Self::verified(result),
            Err(e) => Self::from(&e),
        }
    }
}
