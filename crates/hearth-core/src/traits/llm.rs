//! Completion service trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HearthResult;

/// A single request/response call to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Persona and framing instructions.
    pub system_prompt: String,
    /// The user's entry text (plus any follow-up context).
    pub content: String,
    /// Model identifier for the selected tier.
    pub model: String,
    /// Token cap for the completion.
    pub max_tokens: u32,
    /// Sampling temperature override.
    pub temperature: Option<f32>,
}

/// Response from the completion service.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Generated text content.
    pub content: Option<String>,
    /// Token usage statistics.
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Response with text only.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            usage: None,
        }
    }

    /// Attach usage statistics.
    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.usage = Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        });
        self
    }

    /// Get the content or an empty string.
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Total tokens.
    pub total_tokens: u32,
}

/// Completion service. All providers implement this.
///
/// Implementations map provider failures onto [`crate::HearthError`] so the
/// engine can tell transient failures (retry) from permanent ones.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Llm: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> HearthResult<LlmResponse>;

    /// Provider name for logging.
    fn provider_name(&self) -> &str;
}

/// LLM connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Default model name/identifier.
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate when a request does not set a cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// API key (if not using environment variable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL for API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
            base_url: None,
        }
    }
}
