//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Direct mode was selected but none of the credential variables is set.
    #[error(
        "No upstream credential found (checked: {checked}). Set one of them, \
         configure upstream.backend_url for proxy mode, or pass --allow-missing-credential"
    )]
    MissingCredential { checked: String },
}
