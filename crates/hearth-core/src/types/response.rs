//! Response objects produced by the generation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Persona;

/// Why a request ended on the emergency fallback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    RateLimited,
    BudgetExceeded,
    MalformedOutput,
    UnsafeContent,
    ProviderUnavailable,
    Timeout,
}

/// A finished, safety-checked response.
///
/// Always produced, even under total provider failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub message: String,
    /// In `[0, 1]`.
    pub confidence_score: f32,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_question: Option<String>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    /// Set when this is the emergency fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl ResponseResult {
    /// Whether this response is the emergency fallback.
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Row persisted as an "AI insight" against an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsight {
    pub id: String,
    pub entry_id: String,
    pub user_id: String,
    pub persona: Persona,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_question: Option<String>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    pub confidence_score: f32,
    /// Free-form flags: engagement reason, priority, derived signals.
    pub topic_flags: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AiInsight {
    /// Build an insight row from a response.
    pub fn from_response(
        entry_id: impl Into<String>,
        user_id: impl Into<String>,
        persona: Persona,
        response: &ResponseResult,
        topic_flags: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entry_id: entry_id.into(),
            user_id: user_id.into(),
            persona,
            message: response.message.clone(),
            follow_up_question: response.follow_up_question.clone(),
            suggested_actions: response.suggested_actions.clone(),
            confidence_score: response.confidence_score,
            topic_flags,
            created_at: Utc::now(),
        }
    }
}
