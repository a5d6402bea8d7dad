//! Upstream configuration

use super::{ConfigError, ValidationConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How analysis requests reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMode {
    /// Call the generative model API with a locally held credential
    Direct,
    /// Forward to another broker process that holds the credential
    Proxy,
}

impl std::fmt::Display for UpstreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamMode::Direct => write!(f, "direct"),
            UpstreamMode::Proxy => write!(f, "proxy"),
        }
    }
}

/// Upstream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the generative language API (direct mode)
    pub base_url: String,
    /// Base URL of a backend broker; when set, proxy mode is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    /// Read the credential from this variable only, instead of the
    /// built-in precedence list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Refuse to start in direct mode when no credential is found
    pub require_credential: bool,
    /// Hard deadline for one upstream call
    pub timeout_seconds: u64,
    pub default_model: String,
    pub default_thinking_budget: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            backend_url: None,
            api_key_env: None,
            require_credential: true,
            timeout_seconds: 30,
            default_model: "gemini-2.5-flash".to_string(),
            default_thinking_budget: 8_192,
        }
    }
}

impl UpstreamConfig {
    pub fn mode(&self) -> UpstreamMode {
        if self.backend_url.is_some() {
            UpstreamMode::Proxy
        } else {
            UpstreamMode::Direct
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub(crate) fn validate(&self, validation: &ValidationConfig) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "upstream.timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }
        if !validation.allowed_models.contains(&self.default_model) {
            return Err(ConfigError::Validation {
                field: "upstream.default_model".to_string(),
                message: format!(
                    "'{}' is not in validation.allowed_models",
                    self.default_model
                ),
            });
        }
        if self.default_thinking_budget > validation.max_thinking_budget {
            return Err(ConfigError::Validation {
                field: "upstream.default_thinking_budget".to_string(),
                message: format!(
                    "must not exceed validation.max_thinking_budget ({})",
                    validation.max_thinking_budget
                ),
            });
        }
        validate_http_url("upstream.base_url", &self.base_url)?;
        if let Some(url) = &self.backend_url {
            validate_http_url("upstream.backend_url", url)?;
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field.to_string(),
        message: format!("invalid URL: {}", e),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: field.to_string(),
            message: "URL scheme must be http or https".to_string(),
        });
    }
    Ok(())
}
