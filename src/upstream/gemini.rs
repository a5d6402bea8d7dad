//! Direct transport for the Gemini generative language API.

use super::{Credential, Transport, UpstreamError};
use crate::validation::AnalysisRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the API key. Using a header keeps the key out of URLs,
/// which reqwest includes in its error messages.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Longest upstream error detail kept for dev-mode messages.
const MAX_DETAIL_CHARS: usize = 500;

/// Calls `POST {base_url}/v1beta/models/{model}:generateContent`.
///
/// The prompt is sent as a single user turn; the thinking budget maps to
/// `generationConfig.thinkingConfig.thinkingBudget`. The response text is
/// the concatenation of the first candidate's text parts.
pub struct GeminiTransport {
    /// Base URL (e.g., "https://generativelanguage.googleapis.com")
    base_url: String,
    credential: Credential,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
    /// Reported in timeout errors raised by the client itself
    timeout: Duration,
}

impl GeminiTransport {
    pub fn new(
        base_url: String,
        credential: Credential,
        client: Arc<Client>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            client,
            timeout,
        }
    }

    fn build_request(request: &AnalysisRequest) -> GeminiRequest<'_> {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiRequestPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                thinking_config: GeminiThinkingConfig {
                    thinking_budget: request.thinking_budget,
                },
            },
        }
    }

    fn extract_text(response: GeminiResponse) -> Result<String, UpstreamError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(UpstreamError::EmptyResponse)?;

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            Err(UpstreamError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

/// Gemini generateContent request format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    thinking_config: GeminiThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiThinkingConfig {
    thinking_budget: u32,
}

/// Gemini generateContent response format
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
    /// Thought summaries are not part of the answer
    #[serde(default)]
    thought: bool,
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Pull a short description out of an error body.
fn error_detail(body: &str) -> String {
    let detail = match serde_json::from_str::<GeminiErrorResponse>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(status) => format!("{}: {}", status, parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    };
    detail.chars().take(MAX_DETAIL_CHARS).collect()
}

#[async_trait]
impl Transport for GeminiTransport {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn send(
        &self,
        request: &AnalysisRequest,
        _client: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        tracing::debug!(
            transport = "gemini",
            model = %request.model,
            thinking_budget = request.thinking_budget,
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.credential.expose())
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: error_detail(&body),
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            UpstreamError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
        })?;

        Self::extract_text(parsed)
    }

    fn redact(&self, message: &str) -> String {
        self.credential.redact(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const KEY: &str = "test-key-123";

    fn transport(base_url: String) -> GeminiTransport {
        GeminiTransport::new(
            base_url,
            Credential::new(KEY),
            Arc::new(Client::new()),
            Duration::from_secs(30),
        )
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            prompt: "Analyze this DAO".to_string(),
            model: "gemini-2.5-flash".to_string(),
            thinking_budget: 1024,
        }
    }

    #[tokio::test]
    async fn test_send_success_concatenates_parts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", KEY)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "Analyze this DAO"}]}],
                "generationConfig": {"thinkingConfig": {"thinkingBudget": 1024}}
            })))
            .with_status(200)
            .with_body(
                r###"{"candidates":[{"content":{"role":"model","parts":[{"text":"thinking...","thought":true},{"text":"## Summary\n"},{"text":"Looks healthy."}]},"finishReason":"STOP"}]}"###,
            )
            .create_async()
            .await;

        let text = transport(server.url()).send(&request(), "203.0.113.9").await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "## Summary\nLooks healthy.");
    }

    #[tokio::test]
    async fn test_key_not_in_query_string() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#)
            .create_async()
            .await;

        transport(server.url()).send(&request(), "203.0.113.9").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let err = transport(server.url()).send(&request(), "203.0.113.9").await.unwrap_err();
        assert_eq!(err, UpstreamError::EmptyResponse);
    }

    #[tokio::test]
    async fn test_blank_text_is_empty_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#)
            .create_async()
            .await;

        let err = transport(server.url()).send(&request(), "203.0.113.9").await.unwrap_err();
        assert_eq!(err, UpstreamError::EmptyResponse);
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = transport(server.url()).send(&request(), "203.0.113.9").await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_error_status_extracts_google_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(429)
            .with_body(
                r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
            )
            .create_async()
            .await;

        let err = transport(server.url()).send(&request(), "203.0.113.9").await.unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Status {
                status: 429,
                message: "RESOURCE_EXHAUSTED: Quota exceeded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 1 is reserved and closed on test machines
        let err = transport("http://127.0.0.1:1".to_string())
            .send(&request(), "203.0.113.9")
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Network(_)));
        assert!(!err.to_string().contains(KEY));
    }

    #[test]
    fn test_error_detail_truncates_plain_bodies() {
        let body = "x".repeat(2_000);
        assert_eq!(error_detail(&body).len(), MAX_DETAIL_CHARS);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let t = transport("http://localhost:9/".to_string());
        assert_eq!(t.base_url, "http://localhost:9");
    }

    #[test]
    fn test_redact_uses_credential() {
        let t = transport("http://localhost".to_string());
        assert_eq!(t.redact("key test-key-123"), "key [REDACTED]");
    }
}
