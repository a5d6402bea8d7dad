//! Request validation bounds

use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Models accepted when no allow-list is configured.
pub const DEFAULT_ALLOWED_MODELS: &[&str] =
    &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"];

/// Limits applied by the request validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum prompt length in characters, measured after trimming
    pub max_prompt_chars: usize,
    /// Model identifiers callers may request
    pub allowed_models: Vec<String>,
    /// Upper bound (inclusive) for `thinkingBudget`
    pub max_thinking_budget: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 10_000,
            allowed_models: DEFAULT_ALLOWED_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_thinking_budget: 32_768,
        }
    }
}

impl ValidationConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_prompt_chars == 0 {
            return Err(ConfigError::Validation {
                field: "validation.max_prompt_chars".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        if self.allowed_models.is_empty() {
            return Err(ConfigError::Validation {
                field: "validation.allowed_models".to_string(),
                message: "at least one model must be allowed".to_string(),
            });
        }
        if let Some(i) = self.allowed_models.iter().position(|m| m.trim().is_empty()) {
            return Err(ConfigError::Validation {
                field: format!("validation.allowed_models[{}]", i),
                message: "model name cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}
