//! Error types for upstream calls.

use crate::api::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Errors a [`Transport`](super::Transport) can report.
///
/// These never cross the HTTP boundary directly; the caller maps each one
/// onto an [`ErrorKind`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Network connectivity error (DNS, connection refused, reset, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded deadline.
    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Upstream returned an error response (4xx, 5xx).
    #[error("Upstream error {status}: {message}")]
    Status { status: u16, message: String },

    /// 2xx response without any usable text.
    #[error("Upstream returned no text")]
    EmptyResponse,

    /// 2xx response that does not match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failure already normalized by a backend broker (proxy mode).
    #[error("Backend broker reported {kind}: {message}")]
    Relayed {
        kind: ErrorKind,
        message: String,
        retry_after_seconds: Option<u64>,
    },
}

impl UpstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::Network(_) => ErrorKind::NetworkError,
            UpstreamError::Timeout(_) => ErrorKind::Timeout,
            UpstreamError::Status { .. } => ErrorKind::UpstreamError,
            UpstreamError::EmptyResponse | UpstreamError::InvalidResponse(_) => {
                ErrorKind::EmptyResponse
            }
            UpstreamError::Relayed { kind, .. } => *kind,
        }
    }

    /// Map a reqwest send/read failure.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(timeout)
        } else {
            // without_url keeps hosts and query strings out of messages
            UpstreamError::Network(err.without_url().to_string())
        }
    }
}
