//! Request and response types for the analysis API.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

/// Closed set of failure categories every outcome is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, client's fault
    ValidationError,
    /// Too many requests from this identity
    RateLimited,
    /// Missing credential, operator's fault
    NotConfigured,
    /// Upstream did not answer in time
    Timeout,
    /// Upstream rejected the request
    UpstreamError,
    /// Transport-level failure
    NetworkError,
    /// Upstream succeeded but returned nothing usable
    EmptyResponse,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::ValidationError,
        ErrorKind::RateLimited,
        ErrorKind::NotConfigured,
        ErrorKind::Timeout,
        ErrorKind::UpstreamError,
        ErrorKind::NetworkError,
        ErrorKind::EmptyResponse,
    ];

    /// HTTP status used when this kind crosses the HTTP boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorKind::NetworkError | ErrorKind::EmptyResponse => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Readable message shown to callers when no detail may be exposed.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "The request was invalid",
            ErrorKind::RateLimited => "Too many requests, please try again later",
            ErrorKind::NotConfigured => "The AI service is not configured on this server",
            ErrorKind::Timeout => "The AI service took too long to respond",
            ErrorKind::UpstreamError => "The AI service rejected the request",
            ErrorKind::NetworkError => "Could not reach the AI service",
            ErrorKind::EmptyResponse => "The AI service returned an empty response",
        }
    }

    /// Stable snake_case label, also used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::EmptyResponse => "empty_response",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one analysis request.
///
/// Serializes as `{"text": ...}` or `{"error": ..., "kind": ...}`, so callers
/// can tell the outcome apart without looking at the HTTP status. Rate limit
/// denials additionally carry `retryAfterSeconds`, mirrored in `Retry-After`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Success {
        text: String,
    },
    Failure {
        kind: ErrorKind,
        #[serde(rename = "error")]
        message: String,
        #[serde(
            rename = "retryAfterSeconds",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        retry_after_seconds: Option<u64>,
    },
}

impl AnalysisResult {
    pub fn success(text: impl Into<String>) -> Self {
        AnalysisResult::Success { text: text.into() }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        AnalysisResult::Failure {
            kind,
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    /// Failure carrying the kind's default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::failure(kind, kind.default_message())
    }

    /// Rate limit denial with a back-off hint.
    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        AnalysisResult::Failure {
            kind: ErrorKind::RateLimited,
            message: format!(
                "Too many requests, please try again in {} seconds",
                retry_after_seconds
            ),
            retry_after_seconds: Some(retry_after_seconds),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisResult::Success { .. })
    }

    /// `None` for successes.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AnalysisResult::Success { .. } => None,
            AnalysisResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Back-off hint of a rate limit denial.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            AnalysisResult::Failure {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            AnalysisResult::Success { .. } => None,
        }
    }

    /// Label used for logs and metrics: `success` or the error kind.
    pub fn outcome_label(&self) -> &'static str {
        self.kind().map(|k| k.as_str()).unwrap_or("success")
    }

    fn status_code(&self) -> StatusCode {
        self.kind()
            .map(|k| k.status_code())
            .unwrap_or(StatusCode::OK)
    }
}

impl IntoResponse for AnalysisResult {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after_seconds();
        let mut response = (self.status_code(), Json(self)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
