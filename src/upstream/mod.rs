//! Upstream caller and result normalization.
//!
//! [`UpstreamCaller::call`] is the only way analysis requests leave the
//! process. It applies a hard timeout around a [`Transport`] and maps every
//! outcome onto the closed [`AnalysisResult`] contract. It never panics or
//! returns an error past this boundary.
//!
//! Two transports exist, chosen once at startup by [`build_caller`]:
//!
//! - [`GeminiTransport`] (direct mode) holds the credential and calls the
//!   model API.
//! - [`BackendProxyTransport`] (proxy mode) forwards to another broker.
//!
//! Without a transport the caller answers `NotConfigured` and performs no
//! network I/O.
//!
//! Upstream failures are not retried here. Retrying is a caller decision
//! because every attempt is billed.

pub mod credential;
mod error;
mod gemini;
mod proxy;

pub use credential::{Credential, ResolvedCredential};
pub use error::UpstreamError;
pub use gemini::GeminiTransport;
pub use proxy::BackendProxyTransport;

use crate::api::{AnalysisResult, ErrorKind};
use crate::config::{BrokerConfig, ConfigError, UpstreamMode};
use crate::validation::AnalysisRequest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One way of turning a validated request into generated text.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Issue the request on behalf of `client` (the rate limit identity).
    /// Must be cancel-safe: the caller drops the future on timeout.
    async fn send(&self, request: &AnalysisRequest, client: &str) -> Result<String, UpstreamError>;

    /// Strip secrets known to this transport from a message.
    fn redact(&self, message: &str) -> String {
        message.to_string()
    }
}

/// Timeout + normalization around an optional transport.
pub struct UpstreamCaller {
    transport: Option<Arc<dyn Transport>>,
    timeout: Duration,
    /// Append internal details to failure messages
    dev_mode: bool,
}

impl UpstreamCaller {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, dev_mode: bool) -> Self {
        Self {
            transport: Some(transport),
            timeout,
            dev_mode,
        }
    }

    /// Caller used when no credential is available: every call fails fast.
    pub fn unconfigured(timeout: Duration, dev_mode: bool) -> Self {
        Self {
            transport: None,
            timeout,
            dev_mode,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport
            .as_ref()
            .map(|t| t.name())
            .unwrap_or("unconfigured")
    }

    pub async fn call(&self, request: &AnalysisRequest, client: &str) -> AnalysisResult {
        let start = Instant::now();

        let result = match &self.transport {
            None => AnalysisResult::from_kind(ErrorKind::NotConfigured),
            Some(transport) => {
                let outcome =
                    match tokio::time::timeout(self.timeout, transport.send(request, client)).await
                    {
                        Ok(outcome) => outcome,
                        // Dropping the send future cancels the in-flight request
                        Err(_) => Err(UpstreamError::Timeout(self.timeout)),
                    };
                self.normalize(outcome, |text| transport.redact(text))
            }
        };

        let latency = start.elapsed();
        tracing::info!(
            transport = self.transport_name(),
            model = %request.model,
            prompt_chars = request.prompt_chars(),
            outcome = result.outcome_label(),
            latency_ms = latency.as_millis() as u64,
            "upstream call finished"
        );
        crate::metrics::record_upstream_call(&request.model, &result, latency);

        result
    }

    /// Map a transport outcome onto the public contract.
    ///
    /// Every message that leaves this function, including the log line, has
    /// passed through `redact`.
    fn normalize<R>(&self, outcome: Result<String, UpstreamError>, redact: R) -> AnalysisResult
    where
        R: Fn(&str) -> String,
    {
        let err = match outcome {
            Ok(text) if !text.is_empty() => return AnalysisResult::Success { text },
            Ok(_) => UpstreamError::EmptyResponse,
            Err(err) => err,
        };

        let kind = err.kind();
        let detail = redact(&err.to_string());
        tracing::warn!(kind = %kind, error = %detail, "upstream call failed");

        if let UpstreamError::Relayed {
            message,
            retry_after_seconds,
            ..
        } = err
        {
            // Already normalized by the backend broker
            return AnalysisResult::Failure {
                kind,
                message: redact(&message),
                retry_after_seconds,
            };
        }

        let mut message = match &err {
            UpstreamError::Status { status, .. } => {
                format!("{} (status {})", kind.default_message(), status)
            }
            _ => kind.default_message().to_string(),
        };
        if self.dev_mode {
            message.push_str(": ");
            message.push_str(&detail);
        }
        AnalysisResult::failure(kind, message)
    }
}

/// Shared HTTP client for upstream calls.
///
/// The request deadline is enforced by [`UpstreamCaller`]; the client only
/// bounds connection setup.
pub fn build_http_client() -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Select and build the caller for this process.
///
/// Proxy mode when `upstream.backend_url` is set. Otherwise direct mode,
/// which needs a credential from `lookup`; if none is found the process
/// refuses to start unless `upstream.require_credential` is false.
pub fn build_caller<F>(config: &BrokerConfig, lookup: F) -> Result<UpstreamCaller, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let upstream = &config.upstream;
    let timeout = upstream.timeout();
    let dev_mode = config.server.dev_mode;

    match (upstream.mode(), &upstream.backend_url) {
        (UpstreamMode::Proxy, Some(backend_url)) => {
            let client = Arc::new(build_http_client()?);
            tracing::info!(backend_url = %backend_url, "upstream mode: proxy");
            let transport = BackendProxyTransport::new(backend_url.clone(), client, timeout);
            Ok(UpstreamCaller::new(Arc::new(transport), timeout, dev_mode))
        }
        _ => {
            let api_key_env = upstream.api_key_env.as_deref();
            match credential::resolve_credential(api_key_env, lookup) {
                Some(resolved) => {
                    let client = Arc::new(build_http_client()?);
                    tracing::info!(
                        credential_source = %resolved.source,
                        base_url = %upstream.base_url,
                        "upstream mode: direct"
                    );
                    let transport = GeminiTransport::new(
                        upstream.base_url.clone(),
                        resolved.credential,
                        client,
                        timeout,
                    );
                    Ok(UpstreamCaller::new(Arc::new(transport), timeout, dev_mode))
                }
                None if upstream.require_credential => Err(ConfigError::MissingCredential {
                    checked: credential::candidate_variables(api_key_env).join(", "),
                }),
                None => {
                    tracing::warn!(
                        "no upstream credential found; analysis requests will fail with not_configured"
                    );
                    Ok(UpstreamCaller::unconfigured(timeout, dev_mode))
                }
            }
        }
    }
}
