//! Request validation.
//!
//! Checks the shape and size of an analysis request before any rate limit
//! quota is consumed or any upstream call is made. Validation is pure: the
//! same input always yields the same verdict.

mod error;

pub use error::ValidationError;

use crate::config::{UpstreamConfig, ValidationConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded request body with untyped fields.
///
/// Fields stay as raw JSON so type mismatches produce a [`ValidationError`]
/// instead of a framework rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAnalysisRequest {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default, rename = "thinkingBudget")]
    pub thinking_budget: Option<Value>,
}

impl RawAnalysisRequest {
    /// Decode a request body. Anything that is not a JSON object fails.
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| ValidationError::MalformedBody)?;
        if !value.is_object() {
            return Err(ValidationError::MalformedBody);
        }
        serde_json::from_value(value).map_err(|_| ValidationError::MalformedBody)
    }
}

/// A request that passed validation, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Prompt with surrounding whitespace removed
    pub prompt: String,
    pub model: String,
    #[serde(rename = "thinkingBudget")]
    pub thinking_budget: u32,
}

impl AnalysisRequest {
    /// Prompt length in characters, safe to log.
    pub fn prompt_chars(&self) -> usize {
        self.prompt.chars().count()
    }
}

/// Validates raw requests against configured bounds and fills defaults.
#[derive(Debug, Clone)]
pub struct Validator {
    max_prompt_chars: usize,
    allowed_models: Vec<String>,
    max_thinking_budget: u32,
    default_model: String,
    default_thinking_budget: u32,
}

impl Validator {
    pub fn new(validation: &ValidationConfig, upstream: &UpstreamConfig) -> Self {
        Self {
            max_prompt_chars: validation.max_prompt_chars,
            allowed_models: validation.allowed_models.clone(),
            max_thinking_budget: validation.max_thinking_budget,
            default_model: upstream.default_model.clone(),
            default_thinking_budget: upstream.default_thinking_budget,
        }
    }

    pub fn validate(&self, raw: &RawAnalysisRequest) -> Result<AnalysisRequest, ValidationError> {
        let prompt = self.validate_prompt(raw.prompt.as_ref())?;
        let model = self.validate_model(raw.model.as_ref())?;
        let thinking_budget = self.validate_thinking_budget(raw.thinking_budget.as_ref())?;

        Ok(AnalysisRequest {
            prompt,
            model,
            thinking_budget,
        })
    }

    fn validate_prompt(&self, value: Option<&Value>) -> Result<String, ValidationError> {
        let prompt = match value {
            None | Some(Value::Null) => return Err(ValidationError::MissingPrompt),
            Some(Value::String(s)) => s.trim(),
            Some(_) => return Err(ValidationError::PromptNotString),
        };

        let chars = prompt.chars().count();
        if chars == 0 {
            return Err(ValidationError::EmptyPrompt);
        }
        if chars > self.max_prompt_chars {
            return Err(ValidationError::PromptTooLong {
                max: self.max_prompt_chars,
                actual: chars,
            });
        }
        Ok(prompt.to_string())
    }

    fn validate_model(&self, value: Option<&Value>) -> Result<String, ValidationError> {
        match value {
            None | Some(Value::Null) => Ok(self.default_model.clone()),
            Some(Value::String(model)) if self.allowed_models.iter().any(|m| m == model) => {
                Ok(model.clone())
            }
            Some(Value::String(_)) => Err(ValidationError::ModelNotAllowed {
                allowed: self.allowed_models.clone(),
            }),
            Some(_) => Err(ValidationError::ModelNotString),
        }
    }

    fn validate_thinking_budget(&self, value: Option<&Value>) -> Result<u32, ValidationError> {
        let invalid = ValidationError::InvalidThinkingBudget {
            max: self.max_thinking_budget,
        };
        match value {
            None | Some(Value::Null) => Ok(self.default_thinking_budget),
            // as_u64 is None for negatives and floats
            Some(Value::Number(n)) => match n.as_u64() {
                Some(budget) if budget <= u64::from(self.max_thinking_budget) => {
                    Ok(budget as u32)
                }
                _ => Err(invalid),
            },
            Some(_) => Err(invalid),
        }
    }
}
