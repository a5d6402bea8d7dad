//! Proxy transport: forwards requests to a backend broker.
//!
//! Used when this process must not hold the credential itself. The backend
//! speaks the same `/api/ai/analyze` contract, so its normalized failures are
//! relayed with their original kind.

use super::{Transport, UpstreamError};
use crate::api::AnalysisResult;
use crate::validation::AnalysisRequest;
use crate::rate_limit::UNKNOWN_IDENTITY;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const ANALYZE_PATH: &str = "/api/ai/analyze";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

pub struct BackendProxyTransport {
    backend_url: String,
    client: Arc<Client>,
    timeout: Duration,
}

impl BackendProxyTransport {
    pub fn new(backend_url: String, client: Arc<Client>, timeout: Duration) -> Self {
        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        }
    }
}

#[async_trait]
impl Transport for BackendProxyTransport {
    fn name(&self) -> &'static str {
        "backend_proxy"
    }

    async fn send(
        &self,
        request: &AnalysisRequest,
        client: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}{}", self.backend_url, ANALYZE_PATH);

        tracing::debug!(
            transport = "backend_proxy",
            model = %request.model,
            "forwarding analysis request to backend broker"
        );

        let mut builder = self.client.post(&url).json(request);
        // The backend keys its quota on this; it must run with trust_forwarded_for
        if client != UNKNOWN_IDENTITY {
            builder = builder.header(FORWARDED_FOR_HEADER, client);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        match serde_json::from_str::<AnalysisResult>(&body) {
            Ok(AnalysisResult::Success { text }) if status.is_success() => {
                if text.is_empty() {
                    Err(UpstreamError::EmptyResponse)
                } else {
                    Ok(text)
                }
            }
            Ok(AnalysisResult::Failure {
                kind,
                message,
                retry_after_seconds,
            }) if !status.is_success() => Err(UpstreamError::Relayed {
                kind,
                message,
                retry_after_seconds: retry_after_seconds.or(retry_after_header),
            }),
            _ if status.is_success() => Err(UpstreamError::InvalidResponse(
                "backend broker returned an unexpected body".to_string(),
            )),
            _ => Err(UpstreamError::Status {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            }),
        }
    }
}
