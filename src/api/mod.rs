//! # Analysis API
//!
//! HTTP surface of the broker.
//!
//! ## Endpoints
//!
//! - `POST /api/ai/analyze` - Validate, rate limit and forward one prompt
//! - `GET /health` - Liveness check, never rate limited
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Example
//!
//! ```no_run
//! use keybroker::api::{create_router, AppState};
//! use keybroker::config::BrokerConfig;
//! use keybroker::rate_limit::{FixedWindowLimiter, RateLimiter};
//! use keybroker::upstream::UpstreamCaller;
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(BrokerConfig::default());
//! let caller = UpstreamCaller::unconfigured(config.upstream.timeout(), false);
//! let limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowLimiter::new(&config.rate_limit));
//!
//! let state = Arc::new(AppState::new(config, caller, Some(limiter)));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Response contract
//!
//! Success is `200 {"text": ...}`. Every failure is `{"error": ..., "kind": ...}`
//! with a status derived from the kind; see [`ErrorKind::status_code`].

mod analyze;
mod health;
pub mod types;

pub use types::*;

use crate::config::{AllowedOrigins, BrokerConfig};
use crate::logging::{request_id_middleware, REQUEST_ID_HEADER};
use crate::rate_limit::RateLimiter;
use crate::upstream::UpstreamCaller;
use crate::validation::Validator;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: Arc<BrokerConfig>,
    pub validator: Validator,
    /// `None` when rate limiting is disabled
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
    pub upstream: Arc<UpstreamCaller>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        config: Arc<BrokerConfig>,
        upstream: UpstreamCaller,
        rate_limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Self {
        let validator = Validator::new(&config.validation, &config.upstream);

        Self {
            config,
            validator,
            rate_limiter,
            upstream: Arc::new(upstream),
            metrics_handle: crate::metrics::prometheus_handle(),
        }
    }
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/api/ai/analyze", post(analyze::handle))
        .route("/health", get(health::handle))
        .route(
            "/metrics",
            get(crate::metrics::handler::metrics_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any(_) => AllowOrigin::any(),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static(analyze::RATE_LIMIT_LIMIT_HEADER),
            HeaderName::from_static(analyze::RATE_LIMIT_REMAINING_HEADER),
        ])
}
