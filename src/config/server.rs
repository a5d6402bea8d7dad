//! Server configuration

use serde::{Deserialize, Serialize};

/// Origins permitted by the CORS layer.
///
/// Serialized as either the string `"*"` or a list of exact origins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedOrigins {
    Any(AnyOrigin),
    List(Vec<String>),
}

/// Marker for the `"*"` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnyOrigin {
    #[serde(rename = "*")]
    Wildcard,
}

impl AllowedOrigins {
    /// Parse a comma separated origin list; `*` anywhere means any origin.
    pub fn parse_list(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any(AnyOrigin::Wildcard)
        } else {
            AllowedOrigins::List(origins)
        }
    }
}

impl Default for AllowedOrigins {
    fn default() -> Self {
        AllowedOrigins::Any(AnyOrigin::Wildcard)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body in bytes
    pub max_body_bytes: usize,
    pub allowed_origins: AllowedOrigins,
    /// Include internal failure details in error messages.
    /// Never enable in production.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_body_bytes: 64 * 1024,
            allowed_origins: AllowedOrigins::default(),
            dev_mode: false,
        }
    }
}
