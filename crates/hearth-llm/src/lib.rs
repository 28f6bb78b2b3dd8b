//! hearth-llm - Completion provider implementations for hearth.
//!
//! # Supported Providers
//!
//! - **Anthropic** (feature: `anthropic`) - Messages API over reqwest
//! - **OpenAI** (feature: `openai`) - Chat completions via async-openai
//!
//! # Example
//!
//! ```ignore
//! use hearth_llm::LlmFactory;
//!
//! let llm = LlmFactory::anthropic()?;
//! let engine = config.build_engine(llm, metrics)?;
//! ```

mod anthropic;
mod factory;
mod openai;

pub use anthropic::AnthropicLlm;
pub use factory::LlmFactory;
pub use openai::OpenAIProvider;

// Re-export core types for convenience
pub use hearth_core::config::LlmProvider;
pub use hearth_core::traits::{CompletionRequest, Llm, LlmConfig, LlmResponse, TokenUsage};

use hearth_core::error::{HearthError, HearthResult};
use secrecy::SecretString;

/// API key from config, falling back to the provider's environment variable.
pub(crate) fn resolve_api_key(config: &LlmConfig, env_var: &str) -> HearthResult<SecretString> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::new)
        .ok_or_else(|| {
            HearthError::Configuration(format!(
                "API key not found. Set {} environment variable or provide api_key in config.",
                env_var
            ))
        })
}

/// Validate a configured base URL, trimming any trailing slash.
pub(crate) fn parse_base_url(base_url: &str) -> HearthResult<String> {
    let url = url::Url::parse(base_url)
        .map_err(|e| HearthError::Configuration(format!("Invalid base_url '{}': {}", base_url, e)))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_api_key_prefers_config() {
        use secrecy::ExposeSecret;

        let config = LlmConfig {
            api_key: Some("sk-config".to_string()),
            ..Default::default()
        };
        let key = resolve_api_key(&config, "HEARTH_TEST_UNSET_KEY").unwrap();
        assert_eq!(key.expose_secret(), "sk-config");
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = LlmConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        let err = resolve_api_key(&config, "HEARTH_TEST_UNSET_KEY").unwrap_err();
        assert!(matches!(err, HearthError::Configuration(_)));
    }

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("https://proxy.example.com/v1/").unwrap(),
            "https://proxy.example.com/v1"
        );
        assert!(parse_base_url("not a url").is_err());
    }
}
