//! Configuration system for hearth.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{GenerationEngine, RetryPolicy};
use crate::error::{HearthError, HearthResult};
use crate::metrics::InMemoryMetricsStore;
use crate::persona::{PersonaConfig, PersonaSelector};
use crate::proactive::ProactiveConfig;
use crate::routing::{CostRouter, RouterConfig};
use crate::safety::{FormatterConfig, ResponseFormatter, SafetyConfig, SafetyValidator};
use crate::traits::{Llm, LlmConfig, MetricsStore};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    OpenAI,
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            config: LlmConfig {
                model: "claude-3-5-haiku-20241022".to_string(),
                ..Default::default()
            },
        }
    }
}

/// Main hearth configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Completion service configuration.
    pub llm: LlmProviderConfig,
    /// Model tiers, cost limits and cache.
    pub router: RouterConfig,
    /// Output safety rules.
    pub safety: SafetyConfig,
    /// Response parsing and suggested actions.
    pub formatter: FormatterConfig,
    /// Provider retry policy.
    pub retry: RetryPolicy,
    /// Persona selection.
    pub personas: PersonaConfig,
    /// Proactive engagement scan.
    pub proactive: ProactiveConfig,
    /// Per-call provider timeout.
    pub provider_timeout_secs: u64,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            llm: LlmProviderConfig::default(),
            router: RouterConfig::default(),
            safety: SafetyConfig::default(),
            formatter: FormatterConfig::default(),
            retry: RetryPolicy::default(),
            personas: PersonaConfig::default(),
            proactive: ProactiveConfig::default(),
            provider_timeout_secs: 30,
        }
    }
}

impl HearthConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> HearthResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| HearthError::Configuration(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| HearthError::Configuration(e.to_string()))
            }
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| HearthError::Configuration(e.to_string()))
            }
            _ => Err(HearthError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables on top of defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `HEARTH_*` variables onto this configuration.
    ///
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(limit) = env_parse::<f64>("HEARTH_DAILY_LIMIT") {
            self.router.daily_limit = limit;
        }
        if let Some(limit) = env_parse::<f64>("HEARTH_MONTHLY_LIMIT") {
            self.router.monthly_limit = limit;
        }
        if let Some(hours) = env_parse::<u64>("HEARTH_CACHE_TTL_HOURS") {
            self.router.cache.ttl_hours = hours;
        }
        if let Some(max) = env_parse::<usize>("HEARTH_CACHE_MAX_ENTRIES") {
            self.router.cache.max_entries = max;
        }

        if let Ok(provider) = std::env::var("HEARTH_LLM_PROVIDER") {
            self.llm.provider = match provider.to_lowercase().as_str() {
                "openai" => LlmProvider::OpenAI,
                _ => LlmProvider::Anthropic,
            };
        }
        if let Ok(model) = std::env::var("HEARTH_LLM_MODEL") {
            self.llm.config.model = model;
        }

        let key_var = match self.llm.provider {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        };
        if let Ok(api_key) = std::env::var(key_var) {
            self.llm.config.api_key = Some(api_key);
        }
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> HearthConfigBuilder {
        HearthConfigBuilder::default()
    }

    /// Per-call provider timeout.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }

    /// Metrics store seeded with this configuration's cost ceilings.
    pub fn metrics_store(&self) -> InMemoryMetricsStore {
        InMemoryMetricsStore::new(self.router.daily_limit, self.router.monthly_limit)
    }

    /// Assemble a generation engine around a provider and a metrics store.
    ///
    /// Fails only if the safety phrase lists do not compile.
    pub fn build_engine(
        &self,
        llm: Arc<dyn Llm>,
        metrics: Arc<dyn MetricsStore>,
    ) -> HearthResult<GenerationEngine> {
        let router = Arc::new(CostRouter::new(self.router.clone(), metrics));
        let validator = SafetyValidator::new(&self.safety)?;

        Ok(GenerationEngine::new(llm, router, validator)
            .with_formatter(ResponseFormatter::new(self.formatter.clone()))
            .with_selector(PersonaSelector::new(self.personas.clone()))
            .with_retry(self.retry.clone())
            .with_provider_timeout(self.provider_timeout())
            .with_temperature(self.llm.config.temperature))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Builder for HearthConfig.
#[derive(Default)]
pub struct HearthConfigBuilder {
    config: HearthConfig,
}

impl HearthConfigBuilder {
    /// Set LLM configuration.
    pub fn llm(mut self, config: LlmProviderConfig) -> Self {
        self.config.llm = config;
        self
    }

    /// Set router configuration.
    pub fn router(mut self, config: RouterConfig) -> Self {
        self.config.router = config;
        self
    }

    /// Set daily and monthly cost ceilings.
    pub fn cost_limits(mut self, daily: f64, monthly: f64) -> Self {
        self.config.router.daily_limit = daily;
        self.config.router.monthly_limit = monthly;
        self
    }

    /// Set safety configuration.
    pub fn safety(mut self, config: SafetyConfig) -> Self {
        self.config.safety = config;
        self
    }

    /// Set formatter configuration.
    pub fn formatter(mut self, config: FormatterConfig) -> Self {
        self.config.formatter = config;
        self
    }

    /// Set retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set persona configuration.
    pub fn personas(mut self, config: PersonaConfig) -> Self {
        self.config.personas = config;
        self
    }

    /// Set proactive configuration.
    pub fn proactive(mut self, config: ProactiveConfig) -> Self {
        self.config.proactive = config;
        self
    }

    /// Set the per-call provider timeout.
    pub fn provider_timeout_secs(mut self, secs: u64) -> Self {
        self.config.provider_timeout_secs = secs;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HearthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HearthConfig::default();
        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(config.router.daily_limit, 5.0);
        assert_eq!(config.router.monthly_limit, 100.0);
        assert_eq!(config.router.cache.ttl_hours, 24);
        assert_eq!(config.provider_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_builder() {
        let config = HearthConfig::builder()
            .cost_limits(2.5, 40.0)
            .retry(RetryPolicy::none())
            .provider_timeout_secs(5)
            .build();

        assert_eq!(config.router.daily_limit, 2.5);
        assert_eq!(config.router.monthly_limit, 40.0);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.provider_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
provider_timeout_secs = 12

[llm]
provider = "openai"
model = "gpt-4o-mini"

[router]
daily_limit = 2.0

[router.cache]
ttl_hours = 6

[proactive]
batch_size = 3
"#
        )
        .unwrap();

        let config = HearthConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider_timeout_secs, 12);
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        assert_eq!(config.llm.config.model, "gpt-4o-mini");
        assert_eq!(config.router.daily_limit, 2.0);
        assert_eq!(config.router.monthly_limit, 100.0);
        assert_eq!(config.router.cache.ttl_hours, 6);
        assert_eq!(config.router.cache.max_entries, 1000);
        assert_eq!(config.proactive.batch_size, 3);
        assert_eq!(config.proactive.lookback_days, 5);
    }

    #[test]
    fn test_json_and_yaml() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"router": {{"monthly_limit": 50.0}}}}"#).unwrap();
        let config = tokio_test::assert_ok!(HearthConfig::from_file(json.path()));
        assert_eq!(config.router.monthly_limit, 50.0);

        let mut yaml = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(yaml, "retry:\n  max_attempts: 2").unwrap();
        let config = tokio_test::assert_ok!(HearthConfig::from_file(yaml.path()));
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = HearthConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, HearthError::Configuration(_)));
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "provider_timeout_secs = \"soon\"").unwrap();
        let err = HearthConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, HearthError::Configuration(_)));
    }

    #[test]
    fn test_build_engine() {
        let config = HearthConfig::builder().cost_limits(1.0, 10.0).build();
        let metrics = Arc::new(config.metrics_store());
        let engine = config
            .build_engine(Arc::new(crate::traits::MockLlm::new()), metrics)
            .unwrap();
        assert_eq!(engine.router().config().daily_limit, 1.0);
        assert_eq!(engine.router().metrics_snapshot().daily_remaining, 1.0);
    }
}
