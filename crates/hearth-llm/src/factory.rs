//! Factory for creating completion providers.

use std::sync::Arc;

use hearth_core::config::{HearthConfig, LlmProvider, LlmProviderConfig};
use hearth_core::error::HearthResult;
use hearth_core::traits::{Llm, LlmConfig};
use tracing::debug;

use crate::anthropic::AnthropicLlm;
use crate::openai::OpenAIProvider;

/// Factory for creating completion providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create a provider from the given configuration.
    pub fn create(provider: LlmProvider, config: LlmConfig) -> HearthResult<Arc<dyn Llm>> {
        debug!(?provider, model = %config.model, "Creating completion provider");
        match provider {
            LlmProvider::Anthropic => Ok(Arc::new(AnthropicLlm::new(config)?)),
            LlmProvider::OpenAI => Ok(Arc::new(OpenAIProvider::new(config)?)),
        }
    }

    /// Create the provider a provider config describes.
    pub fn from_provider_config(config: &LlmProviderConfig) -> HearthResult<Arc<dyn Llm>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Create the provider configured in a [`HearthConfig`].
    pub fn from_config(config: &HearthConfig) -> HearthResult<Arc<dyn Llm>> {
        Self::from_provider_config(&config.llm)
    }

    /// Create an Anthropic provider with default configuration.
    pub fn anthropic() -> HearthResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::Anthropic, LlmConfig::default())
    }

    /// Create an Anthropic provider with a specific model.
    pub fn anthropic_with_model(model: impl Into<String>) -> HearthResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::Anthropic, config)
    }

    /// Create an OpenAI provider with default configuration.
    pub fn openai() -> HearthResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::OpenAI, LlmConfig::default())
    }

    /// Create an OpenAI provider with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> HearthResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::OpenAI, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_by_provider() {
        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let anthropic = tokio_test::assert_ok!(LlmFactory::create(LlmProvider::Anthropic, config.clone()));
        assert_eq!(anthropic.provider_name(), "anthropic");

        let openai = tokio_test::assert_ok!(LlmFactory::create(LlmProvider::OpenAI, config));
        assert_eq!(openai.provider_name(), "openai");
    }

    #[test]
    fn test_from_config_uses_llm_section() {
        let mut config = HearthConfig::default();
        config.llm.config.api_key = Some("test-key".to_string());
        let llm = LlmFactory::from_config(&config).unwrap();
        assert_eq!(llm.provider_name(), "anthropic");
    }
}
