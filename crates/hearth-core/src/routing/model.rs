//! Complexity and model tiers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Coarse request bucket used to pick a model and estimate cost.
///
/// Computed once per request and never changed afterwards.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
}

/// A priced capability level of the completion service.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Primary,
    Economy,
    /// No model call; the static emergency message is served.
    Fallback,
}

/// Pricing and token budget for one model tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTierConfig {
    /// Model identifier sent to the provider.
    pub model: String,
    /// USD per 1,000 tokens.
    pub cost_per_1k_tokens: f64,
    /// Token cap for a completion on this tier.
    pub max_tokens: u32,
}

impl ModelTierConfig {
    /// Create a tier config.
    pub fn new(model: impl Into<String>, cost_per_1k_tokens: f64, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            cost_per_1k_tokens,
            max_tokens,
        }
    }

    /// Cost of `tokens` at this tier's rate.
    pub fn cost_for(&self, tokens: u64) -> f64 {
        tokens as f64 / 1000.0 * self.cost_per_1k_tokens
    }
}

/// The three tiers side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTiers {
    pub primary: ModelTierConfig,
    pub economy: ModelTierConfig,
    pub fallback: ModelTierConfig,
}

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            primary: ModelTierConfig::new("claude-3-5-sonnet-20241022", 0.015, 1000),
            economy: ModelTierConfig::new("claude-3-5-haiku-20241022", 0.002, 500),
            fallback: ModelTierConfig::new("static-fallback", 0.0, 0),
        }
    }
}

impl ModelTiers {
    /// Config for a tier.
    pub fn get(&self, tier: ModelTier) -> &ModelTierConfig {
        match tier {
            ModelTier::Primary => &self.primary,
            ModelTier::Economy => &self.economy,
            ModelTier::Fallback => &self.fallback,
        }
    }
}

/// Static complexity → preferred model mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierMap {
    pub simple: ModelTier,
    pub moderate: ModelTier,
    pub complex: ModelTier,
}

impl Default for TierMap {
    fn default() -> Self {
        Self {
            simple: ModelTier::Economy,
            moderate: ModelTier::Primary,
            complex: ModelTier::Primary,
        }
    }
}

impl TierMap {
    /// Preferred model for a complexity tier.
    pub fn preferred(&self, complexity: ComplexityTier) -> ModelTier {
        match complexity {
            ComplexityTier::Simple => self.simple,
            ComplexityTier::Moderate => self.moderate,
            ComplexityTier::Complex => self.complex,
        }
    }
}

/// Estimated tokens per request, by complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEstimates {
    pub simple: u32,
    pub moderate: u32,
    pub complex: u32,
}

impl Default for TokenEstimates {
    fn default() -> Self {
        Self {
            simple: 300,
            moderate: 600,
            complex: 1000,
        }
    }
}

impl TokenEstimates {
    /// Estimate for a complexity tier.
    pub fn for_tier(&self, complexity: ComplexityTier) -> u32 {
        match complexity {
            ComplexityTier::Simple => self.simple,
            ComplexityTier::Moderate => self.moderate,
            ComplexityTier::Complex => self.complex,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_for_tokens() {
        let tiers = ModelTiers::default();
        assert!((tiers.primary.cost_for(2000) - 0.03).abs() < 1e-12);
        assert!((tiers.economy.cost_for(500) - 0.001).abs() < 1e-12);
        assert_eq!(tiers.fallback.cost_for(10_000), 0.0);
    }

    #[test]
    fn test_default_tier_map() {
        let map = TierMap::default();
        assert_eq!(map.preferred(ComplexityTier::Simple), ModelTier::Economy);
        assert_eq!(map.preferred(ComplexityTier::Complex), ModelTier::Primary);
    }
}
