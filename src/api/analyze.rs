//! Analysis endpoint handler.

use crate::api::{AnalysisResult, AppState, ErrorKind};
use crate::logging::{generate_request_id, RequestId};
use crate::rate_limit::{client_identity, RateLimitDecision};
use crate::validation::{RawAnalysisRequest, ValidationError};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// POST /api/ai/analyze - Validate, rate limit and forward one prompt.
///
/// Validation runs before the limiter so rejected bodies do not consume quota.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request_id: Option<Extension<RequestId>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(generate_request_id);
    let span = tracing::info_span!("analyze", request_id = %request_id);

    async move {
        let start = Instant::now();

        let body = match body {
            Ok(body) => body,
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                tracing::warn!(
                    limit = state.config.server.max_body_bytes,
                    "Request body exceeds size limit"
                );
                crate::metrics::record_request(ErrorKind::ValidationError.as_str());
                return payload_too_large(state.config.server.max_body_bytes);
            }
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Failed to read request body");
                return reject(ValidationError::MalformedBody);
            }
        };

        let request = match RawAnalysisRequest::from_slice(&body)
            .and_then(|raw| state.validator.validate(&raw))
        {
            Ok(request) => request,
            Err(err) => return reject(err),
        };

        let identity = client_identity(
            &headers,
            connect_info.map(|ConnectInfo(addr)| addr),
            state.config.rate_limit.trust_forwarded_for,
        );

        let quota = if let Some(limiter) = &state.rate_limiter {
            match limiter.check_and_consume(&identity).await {
                RateLimitDecision::Allowed { remaining } => Some((limiter.limit(), remaining)),
                RateLimitDecision::Denied {
                    retry_after_seconds,
                } => {
                    tracing::warn!(
                        client = %identity,
                        retry_after_seconds,
                        "Rate limit exceeded"
                    );
                    crate::metrics::record_rate_limited();
                    crate::metrics::record_request(ErrorKind::RateLimited.as_str());
                    return AnalysisResult::rate_limited(retry_after_seconds).into_response();
                }
            }
        } else {
            None
        };

        let result = state.upstream.call(&request, &identity).await;
        let outcome = result.outcome_label();
        crate::metrics::record_request(outcome);

        tracing::info!(
            model = %request.model,
            outcome,
            total_ms = start.elapsed().as_millis() as u64,
            "Analysis request completed"
        );

        let mut response = result.into_response();
        if let Some((limit, remaining)) = quota {
            insert_quota_headers(response.headers_mut(), limit, remaining);
        }
        response
    }
    .instrument(span)
    .await
}

fn reject(err: ValidationError) -> Response {
    tracing::debug!(reason = err.reason(), "Request rejected by validation");
    crate::metrics::record_request(ErrorKind::ValidationError.as_str());
    AnalysisResult::failure(ErrorKind::ValidationError, err.to_string()).into_response()
}

fn payload_too_large(limit: usize) -> Response {
    let body = AnalysisResult::failure(
        ErrorKind::ValidationError,
        format!("Request body exceeds the maximum size of {} bytes", limit),
    );
    (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
}

fn insert_quota_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER),
        HeaderValue::from(limit),
    );
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
        HeaderValue::from(remaining),
    );
}
