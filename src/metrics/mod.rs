//! # Metrics
//!
//! Prometheus metrics for the analysis endpoint, exposed on `GET /metrics`.
//!
//! **Counters:**
//! - `keybroker_requests_total{outcome}` - Analysis requests by final outcome
//! - `keybroker_rate_limited_total` - Requests denied by the rate limiter
//!
//! **Histograms:**
//! - `keybroker_upstream_duration_seconds{model, outcome}` - Upstream call latency
//!
//! Labels only carry allow-listed model names and fixed outcome labels, so
//! cardinality is bounded by configuration.

pub mod handler;

use crate::api::AnalysisResult;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder with custom histogram buckets.
///
/// Upstream buckets reach past the 30s default timeout.
pub fn setup_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    let duration_buckets = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("keybroker_upstream_duration_seconds".to_string()),
            duration_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Process-wide handle for rendering metrics.
///
/// The first call installs the recorder. If a recorder is already installed
/// (e.g. several app states in one test binary) a detached handle is used.
pub fn prometheus_handle() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            setup_metrics().unwrap_or_else(|e| {
                tracing::debug!("Metrics already initialized, creating detached handle: {}", e);
                PrometheusBuilder::new().build_recorder().handle()
            })
        })
        .clone()
}

/// Count one finished analysis request.
pub fn record_request(outcome: &'static str) {
    metrics::counter!("keybroker_requests_total", "outcome" => outcome).increment(1);
}

/// Count one rate limit denial.
pub fn record_rate_limited() {
    metrics::counter!("keybroker_rate_limited_total").increment(1);
}

/// Record latency of one upstream call.
pub fn record_upstream_call(model: &str, result: &AnalysisResult, latency: Duration) {
    metrics::histogram!(
        "keybroker_upstream_duration_seconds",
        "model" => model.to_string(),
        "outcome" => result.outcome_label()
    )
    .record(latency.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;

    #[test]
    fn test_recording_without_installed_recorder_is_noop() {
        record_request("success");
        record_rate_limited();
        record_upstream_call(
            "gemini-2.5-flash",
            &AnalysisResult::from_kind(ErrorKind::Timeout),
            Duration::from_millis(5),
        );
    }

    #[test]
    fn test_prometheus_handle_is_reusable() {
        let first = prometheus_handle();
        let second = prometheus_handle();
        // Both render without panicking
        let _ = first.render();
        let _ = second.render();
    }
}
