//! OpenAI completion provider.

use async_trait::async_trait;

use hearth_core::error::{HearthError, HearthResult};
use hearth_core::traits::{CompletionRequest, Llm, LlmConfig, LlmResponse};

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    Client,
};
#[cfg(feature = "openai")]
use hearth_core::traits::TokenUsage;
#[cfg(feature = "openai")]
use secrecy::ExposeSecret;
#[cfg(feature = "openai")]
use tracing::debug;

use crate::{parse_base_url, resolve_api_key};

/// OpenAI completion provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(config: LlmConfig) -> HearthResult<Self> {
        let api_key = resolve_api_key(&config, "OPENAI_API_KEY")?;
        let base_url = config.base_url.as_deref().map(parse_base_url).transpose()?;

        #[cfg(feature = "openai")]
        let client = {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key.expose_secret());
            if let Some(base_url) = &base_url {
                openai_config = openai_config.with_api_base(base_url);
            }
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = (api_key, base_url);

        let mut config = config;
        if config.model.is_empty() {
            config.model = "gpt-4o-mini".to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(model: &str) -> bool {
        let model_lower = model.to_lowercase();
        ["o1", "o3", "gpt-5"].iter().any(|m| model_lower.starts_with(m))
    }

    #[cfg(feature = "openai")]
    fn build_request(&self, request: &CompletionRequest) -> CreateChatCompletionRequest {
        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };

        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(
                    request.system_prompt.clone(),
                ),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(request.content.clone()),
                name: None,
            }),
        ];

        let mut chat = CreateChatCompletionRequest {
            model,
            messages,
            ..Default::default()
        };

        if !Self::is_reasoning_model(&chat.model) {
            chat.temperature = Some(request.temperature.unwrap_or(self.config.temperature));
            let cap = if request.max_tokens == 0 {
                self.config.max_tokens
            } else {
                request.max_tokens
            };
            chat.max_tokens = Some(cap);
        }
        chat
    }
}

/// Map an async-openai error onto the error taxonomy.
#[cfg(feature = "openai")]
fn map_error(e: OpenAIError) -> HearthError {
    match e {
        OpenAIError::Reqwest(inner) if inner.is_timeout() => {
            HearthError::timeout(format!("OpenAI API request timed out: {}", inner))
        }
        OpenAIError::Reqwest(inner) => match inner.status() {
            Some(status) => HearthError::from_http_status(status.as_u16(), &inner.to_string()),
            None => HearthError::network(format!("OpenAI API request failed: {}", inner)),
        },
        OpenAIError::ApiError(api) => {
            let kind = api.code.as_deref().or(api.r#type.as_deref()).unwrap_or("");
            match kind {
                "rate_limit_exceeded" | "insufficient_quota" => HearthError::rate_limit(api.message),
                "invalid_api_key" | "invalid_authentication" => {
                    HearthError::authentication(api.message)
                }
                "server_error" => HearthError::llm_server(api.message),
                "invalid_request_error" => HearthError::validation(api.message),
                _ => HearthError::llm(format!("OpenAI API error: {}", api.message)),
            }
        }
        OpenAIError::JSONDeserialize(inner) => {
            HearthError::invalid_response(format!("Failed to parse response: {}", inner))
        }
        other => HearthError::llm(format!("OpenAI API error: {}", other)),
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn complete(&self, request: &CompletionRequest) -> HearthResult<LlmResponse> {
        let chat = self.build_request(request);
        debug!(model = %chat.model, max_tokens = ?chat.max_tokens, "Calling OpenAI");

        let response = self.client.chat().create(chat).await.map_err(map_error)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| HearthError::invalid_response("No response choices returned"))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse {
            content: choice.message.content.clone(),
            usage,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn complete(&self, _request: &CompletionRequest) -> HearthResult<LlmResponse> {
        Err(HearthError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new(LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_model() {
        assert_eq!(provider().config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_reasoning_model_detection() {
        assert!(OpenAIProvider::is_reasoning_model("o1-mini"));
        assert!(OpenAIProvider::is_reasoning_model("o3"));
        assert!(!OpenAIProvider::is_reasoning_model("gpt-4o-mini"));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_request_carries_tier_model_and_cap() {
        let completion = CompletionRequest {
            system_prompt: "You are Spark.".to_string(),
            content: "Big project tomorrow.".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 500,
            temperature: Some(0.4),
        };
        let chat = provider().build_request(&completion);
        assert_eq!(chat.model, "gpt-4o");
        assert_eq!(chat.max_tokens, Some(500));
        assert_eq!(chat.temperature, Some(0.4));
        assert_eq!(chat.messages.len(), 2);
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_reasoning_models_omit_sampling() {
        let completion = CompletionRequest {
            system_prompt: "You are Sage.".to_string(),
            content: "Same week again.".to_string(),
            model: "o1-mini".to_string(),
            max_tokens: 500,
            temperature: None,
        };
        let chat = provider().build_request(&completion);
        assert!(chat.temperature.is_none());
        assert!(chat.max_tokens.is_none());
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_api_error_mapping() {
        use async_openai::error::ApiError;

        let api = |code: &str| {
            OpenAIError::ApiError(ApiError {
                message: "nope".to_string(),
                r#type: None,
                param: None,
                code: Some(code.to_string()),
            })
        };
        assert!(map_error(api("rate_limit_exceeded")).is_transient());
        assert!(!map_error(api("invalid_api_key")).is_transient());
        assert!(map_error(api("server_error")).is_transient());
    }
}
