//! Shared test utilities for keybroker integration tests.
//!
//! Builds routers wired to wiremock upstreams and provides request and
//! response helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use keybroker::api::AppState;
use keybroker::cli::serve::{build_api_router, build_rate_limiter};
use keybroker::config::BrokerConfig;
use keybroker::upstream::build_caller;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use wiremock::MockServer;

// =============================================================================
// Well-Known Test Constants
// =============================================================================

/// Credential handed to direct-mode brokers under test.
pub const TEST_API_KEY: &str = "AIzaSy-test-secret-0123456789";

/// Peer address used when a test does not care about identity.
pub const DEFAULT_PEER: &str = "198.51.100.20:40000";

/// Path Gemini serves for the default model.
pub const DEFAULT_MODEL_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

// =============================================================================
// App Builders
// =============================================================================

/// Default config pointing the direct transport at `base_url`.
pub fn config_for(base_url: &str) -> BrokerConfig {
    let mut config = BrokerConfig::default();
    config.upstream.base_url = base_url.to_string();
    config
}

/// Build a router from `config`, resolving credentials through `lookup`.
pub fn make_app_with_lookup<F>(config: BrokerConfig, lookup: F) -> (Router, Arc<AppState>)
where
    F: Fn(&str) -> Option<String>,
{
    let caller = build_caller(&config, lookup).expect("caller should build");
    let limiter = build_rate_limiter(&config);
    build_api_router(Arc::new(config), caller, limiter)
}

/// Direct-mode router with [`TEST_API_KEY`] as `GEMINI_API_KEY`.
pub fn make_app(config: BrokerConfig) -> (Router, Arc<AppState>) {
    make_app_with_lookup(config, |name| {
        (name == "GEMINI_API_KEY").then(|| TEST_API_KEY.to_string())
    })
}

/// Direct-mode router whose upstream is `mock_server`.
pub fn make_app_with_mock(mock_server: &MockServer) -> (Router, Arc<AppState>) {
    make_app(config_for(&mock_server.uri()))
}

/// Router started without any credential (`require_credential = false`).
pub fn make_unconfigured_app(mock_server: &MockServer) -> (Router, Arc<AppState>) {
    let mut config = config_for(&mock_server.uri());
    config.upstream.require_credential = false;
    make_app_with_lookup(config, |_| None)
}

// =============================================================================
// Requests
// =============================================================================

/// `POST /api/ai/analyze` from [`DEFAULT_PEER`].
pub fn analyze_request(body: impl Into<Body>) -> Request<Body> {
    analyze_request_from(DEFAULT_PEER, body)
}

/// `POST /api/ai/analyze` from the given peer address.
pub fn analyze_request_from(peer: &str, body: impl Into<Body>) -> Request<Body> {
    let addr: SocketAddr = peer.parse().expect("valid socket address");
    Request::builder()
        .method("POST")
        .uri("/api/ai/analyze")
        .header("content-type", "application/json")
        .extension(ConnectInfo(addr))
        .body(body.into())
        .unwrap()
}

/// JSON body with only a prompt.
pub fn prompt_body(prompt: &str) -> String {
    json!({ "prompt": prompt }).to_string()
}

// =============================================================================
// Responses
// =============================================================================

/// A successful `generateContent` response with one text part.
pub fn gemini_text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": text }]
            },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 34 }
    })
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as a string.
pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}
