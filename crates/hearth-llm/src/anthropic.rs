//! Anthropic (Claude) completion provider.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use hearth_core::error::{HearthError, HearthResult};
use hearth_core::traits::{CompletionRequest, Llm, LlmConfig, LlmResponse, TokenUsage};

use crate::{parse_base_url, resolve_api_key};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic completion provider.
pub struct AnthropicLlm {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

impl AnthropicLlm {
    /// Create a new Anthropic provider.
    pub fn new(config: LlmConfig) -> HearthResult<Self> {
        let api_key = resolve_api_key(&config, "ANTHROPIC_API_KEY")?;

        let mut key_header = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| HearthError::Configuration("Invalid API key format".to_string()))?;
        key_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key_header);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| HearthError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = match &config.base_url {
            Some(url) => parse_base_url(url)?,
            None => ANTHROPIC_API_URL.to_string(),
        };

        let mut config = config;
        if config.model.is_empty() {
            config.model = "claude-3-5-haiku-20241022".to_string();
        }

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> AnthropicRequest<'a> {
        let model = if request.model.is_empty() {
            self.config.model.as_str()
        } else {
            request.model.as_str()
        };
        let max_tokens = if request.max_tokens == 0 {
            self.config.max_tokens
        } else {
            request.max_tokens
        };

        AnthropicRequest {
            model,
            max_tokens,
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
            system: &request.system_prompt,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.content,
            }],
        }
    }
}

/// Map a non-success status and body onto the error taxonomy.
fn error_from_status(status: u16, body: &str) -> HearthError {
    let message = serde_json::from_str::<AnthropicError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    HearthError::from_http_status(status, &format!("Anthropic API error: {}", message))
}

fn parse_response(body: &str) -> HearthResult<LlmResponse> {
    let response: AnthropicResponse = serde_json::from_str(body)
        .map_err(|e| HearthError::invalid_response(format!("Failed to parse response: {}", e)))?;

    let content = response
        .content
        .into_iter()
        .find(|c| c.content_type == "text")
        .and_then(|c| c.text);

    let usage = response.usage.map(|u| TokenUsage {
        prompt_tokens: u.input_tokens,
        completion_tokens: u.output_tokens,
        total_tokens: u.input_tokens + u.output_tokens,
    });

    Ok(LlmResponse { content, usage })
}

fn transport_error(e: reqwest::Error) -> HearthError {
    if e.is_timeout() {
        HearthError::timeout(format!("Anthropic API request timed out: {}", e))
    } else if e.is_connect() || e.is_request() {
        HearthError::network(format!("Anthropic API request failed: {}", e))
    } else {
        HearthError::llm(format!("Anthropic API request failed: {}", e))
    }
}

#[async_trait]
impl Llm for AnthropicLlm {
    async fn complete(&self, request: &CompletionRequest) -> HearthResult<LlmResponse> {
        let body = self.build_request(request);
        debug!(model = body.model, max_tokens = body.max_tokens, "Calling Anthropic");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &text));
        }

        parse_response(&text)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}
