//! Validation error types.

use thiserror::Error;

/// Reasons a request is rejected before any upstream call.
///
/// Messages never contain the submitted values, only the constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    MalformedBody,

    #[error("Field 'prompt' is required")]
    MissingPrompt,

    #[error("Field 'prompt' must be a string")]
    PromptNotString,

    #[error("Field 'prompt' must not be empty")]
    EmptyPrompt,

    #[error("Field 'prompt' exceeds the maximum length of {max} characters ({actual} given)")]
    PromptTooLong { max: usize, actual: usize },

    #[error("Field 'model' must be a string")]
    ModelNotString,

    #[error("Field 'model' must be one of: {}", allowed.join(", "))]
    ModelNotAllowed { allowed: Vec<String> },

    #[error("Field 'thinkingBudget' must be an integer between 0 and {max}")]
    InvalidThinkingBudget { max: u32 },
}

impl ValidationError {
    /// Short machine-friendly name, used as a log field.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MalformedBody => "malformed_body",
            ValidationError::MissingPrompt => "missing_prompt",
            ValidationError::PromptNotString => "prompt_not_string",
            ValidationError::EmptyPrompt => "empty_prompt",
            ValidationError::PromptTooLong { .. } => "prompt_too_long",
            ValidationError::ModelNotString => "model_not_string",
            ValidationError::ModelNotAllowed { .. } => "model_not_allowed",
            ValidationError::InvalidThinkingBudget { .. } => "invalid_thinking_budget",
        }
    }
}
