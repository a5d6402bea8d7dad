//! Rate limit configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Window length in seconds
    pub window_seconds: u64,
    /// Requests allowed per identity per window
    pub max_requests: u32,
    /// How often expired windows are purged from memory
    pub sweep_interval_seconds: u64,
    /// Use the first `X-Forwarded-For` hop as the client identity.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_seconds: 15 * 60,
            max_requests: 100,
            sweep_interval_seconds: 60,
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "rate_limit.window_seconds".to_string(),
                message: "window must be at least one second".to_string(),
            });
        }
        if self.max_requests == 0 {
            return Err(ConfigError::Validation {
                field: "rate_limit.max_requests".to_string(),
                message: "max_requests must be non-zero (set enabled = false to disable)"
                    .to_string(),
            });
        }
        Ok(())
    }
}
