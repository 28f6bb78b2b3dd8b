//! User preference records.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How chatty the user wants the companion to be.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionLevel {
    Quiet,
    #[default]
    Balanced,
    Active,
    High,
}

/// Persona availability tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

/// A user's preference/tier record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default)]
    pub interaction_level: InteractionLevel,
    #[serde(default)]
    pub tier: SubscriptionTier,
}

impl UserPreferences {
    /// Preferences with default interaction level and tier.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            interaction_level: InteractionLevel::default(),
            tier: SubscriptionTier::default(),
        }
    }

    /// Set the interaction level.
    pub fn with_interaction_level(mut self, level: InteractionLevel) -> Self {
        self.interaction_level = level;
        self
    }

    /// Set the subscription tier.
    pub fn with_tier(mut self, tier: SubscriptionTier) -> Self {
        self.tier = tier;
        self
    }
}
