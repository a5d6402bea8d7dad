//! Proxy mode: a credential-less broker forwarding to a backend broker.
//!
//! The backend broker is served on a real socket; its Gemini upstream is a
//! wiremock server. The front broker is driven in-process.

mod common;

use axum::http::StatusCode;
use common::{
    analyze_request, analyze_request_from, body_json, body_string, config_for,
    gemini_text_response, make_app, make_app_with_lookup, prompt_body, TEST_API_KEY,
};
use keybroker::config::BrokerConfig;
use serde_json::json;
use std::net::SocketAddr;
use tower::Service;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve a direct-mode broker on an ephemeral port and return its base URL.
async fn spawn_backend_broker(config: BrokerConfig) -> String {
    let (app, _) = make_app(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    format!("http://{}", addr)
}

/// Front broker in proxy mode. No credential variable is visible to it.
fn make_proxy_app(backend_url: &str) -> axum::Router {
    let mut config = BrokerConfig::default();
    config.upstream.backend_url = Some(backend_url.to_string());
    let (app, state) = make_app_with_lookup(config, |_| None);
    assert_eq!(state.upstream.transport_name(), "backend_proxy");
    app
}

#[tokio::test]
async fn test_proxy_mode_end_to_end_success() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_text_response("Relayed verdict")),
        )
        .expect(1)
        .mount(&gemini)
        .await;

    let backend_url = spawn_backend_broker(config_for(&gemini.uri())).await;
    let mut app = make_proxy_app(&backend_url);

    let response = app.call(analyze_request(prompt_body("hi"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "text": "Relayed verdict" }));
}

#[tokio::test]
async fn test_proxy_mode_relays_backend_failure_kind() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&gemini)
        .await;

    let backend_url = spawn_backend_broker(config_for(&gemini.uri())).await;
    let mut app = make_proxy_app(&backend_url);

    let response = app.call(analyze_request(prompt_body("hi"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "empty_response");
}

#[tokio::test]
async fn test_proxy_mode_relays_unconfigured_backend() {
    let gemini = MockServer::start().await;

    let mut backend_config = config_for(&gemini.uri());
    backend_config.upstream.require_credential = false;
    let (backend_app, _) = make_app_with_lookup(backend_config, |_| None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            backend_app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let mut app = make_proxy_app(&format!("http://{}", addr));
    let response = app.call(analyze_request(prompt_body("hi"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "not_configured");
}

#[tokio::test]
async fn test_proxy_mode_validates_before_forwarding() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "unused" })))
        .expect(0)
        .mount(&backend)
        .await;

    let mut app = make_proxy_app(&backend.uri());
    let response = app.call(analyze_request(prompt_body("   "))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_proxy_mode_never_sends_a_credential() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/ai/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "fine" })))
        .mount(&backend)
        .await;

    let mut app = make_proxy_app(&backend.uri());
    let response = app.call(analyze_request(prompt_body("hi"))).await.unwrap();
    assert_eq!(body_string(response).await, r#"{"text":"fine"}"#);

    let received = backend.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("x-goog-api-key").is_none());
    assert_eq!(received[0].headers.get("x-forwarded-for").unwrap(), "198.51.100.20");
    let forwarded: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(
        forwarded,
        json!({ "prompt": "hi", "model": "gemini-2.5-flash", "thinkingBudget": 8192 })
    );
}

#[tokio::test]
async fn test_proxy_mode_keeps_per_client_quota_on_backend() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text_response("ok")))
        .mount(&gemini)
        .await;

    let mut backend_config = config_for(&gemini.uri());
    backend_config.rate_limit.max_requests = 2;
    backend_config.rate_limit.trust_forwarded_for = true;
    let backend_url = spawn_backend_broker(backend_config).await;
    let mut app = make_proxy_app(&backend_url);

    for _ in 0..2 {
        let response = app
            .call(analyze_request_from("203.0.113.1:5000", prompt_body("hi")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .call(analyze_request_from("203.0.113.1:5000", prompt_body("hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get("retry-after")
        .expect("relayed 429 must carry Retry-After")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "rate_limited");
    assert_eq!(body["retryAfterSeconds"], json!(retry_after));

    // Another client behind the same front broker has its own quota
    let response = app
        .call(analyze_request_from("203.0.113.2:5000", prompt_body("hi")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
