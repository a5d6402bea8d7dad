//! Configuration module for keybroker
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`KEYBROKER_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! The upstream credential itself is never part of this struct. It is read
//! from the environment once at startup, see [`crate::upstream::credential`].
//!
//! # Example
//!
//! ```rust
//! use keybroker::config::BrokerConfig;
//!
//! let config = BrokerConfig::default();
//! assert_eq!(config.server.port, 3001);
//!
//! let toml = r#"
//! [rate_limit]
//! max_requests = 10
//! "#;
//! let config: BrokerConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.rate_limit.max_requests, 10);
//! assert_eq!(config.rate_limit.window_seconds, 900);
//! ```

pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod server;
pub mod upstream;
pub mod validation;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use rate_limit::RateLimitConfig;
pub use server::{AllowedOrigins, ServerConfig};
pub use upstream::{UpstreamConfig, UpstreamMode};
pub use validation::ValidationConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the broker.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BrokerConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Per-client request quotas
    pub rate_limit: RateLimitConfig,
    /// Request validation bounds
    pub validation: ValidationConfig,
    /// Upstream model / backend broker settings
    pub upstream: UpstreamConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BrokerConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports KEYBROKER_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with an
    /// injectable variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server settings
        if let Some(port) = lookup("KEYBROKER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(host) = lookup("KEYBROKER_HOST") {
            self.server.host = host;
        }
        if let Some(origins) = lookup("KEYBROKER_ALLOWED_ORIGIN") {
            self.server.allowed_origins = AllowedOrigins::parse_list(&origins);
        }
        if let Some(dev) = lookup("KEYBROKER_DEV_MODE") {
            self.server.dev_mode = matches!(dev.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        // Upstream mode
        if let Some(url) = lookup("KEYBROKER_BACKEND_URL") {
            let url = url.trim();
            self.upstream.backend_url = if url.is_empty() {
                None
            } else {
                Some(url.to_string())
            };
        }

        // Rate limiting
        if let Some(window) = lookup("KEYBROKER_RATE_LIMIT_WINDOW_SECONDS") {
            if let Ok(w) = window.parse() {
                self.rate_limit.window_seconds = w;
            }
        }
        if let Some(max) = lookup("KEYBROKER_RATE_LIMIT_MAX_REQUESTS") {
            if let Ok(m) = max.parse() {
                self.rate_limit.max_requests = m;
            }
        }

        // Logging settings
        if let Some(level) = lookup("KEYBROKER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("KEYBROKER_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation {
                field: "server.max_body_bytes".to_string(),
                message: "body limit must be non-zero".to_string(),
            });
        }

        self.rate_limit.validate()?;
        self.validation.validate()?;
        self.upstream.validate(&self.validation)?;

        Ok(())
    }
}
