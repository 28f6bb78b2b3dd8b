//! Proactive engagement opportunities.
//!
//! Opportunities are created during a scan and consumed immediately by
//! execution. They are never stored as their own entity; once executed,
//! durability is the caller's concern.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::Persona;

/// Why a delayed comment is worth posting.
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
pub enum EngagementReason {
    /// Entry reported stress of 8 or more.
    HighStressCheckin,
    /// Entry reported mood of 3 or less.
    LowMoodCheckin,
    /// Several recent entries show sustained stress or low mood/energy.
    PatternFollowup,
    /// Entry talks about work.
    WorkFollowup,
    /// Entry has exactly one response; offer another voice.
    SecondPerspective,
}

/// A candidate delayed comment on a past entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementOpportunity {
    pub entry_id: String,
    pub user_id: String,
    pub persona: Persona,
    pub reason: EngagementReason,
    /// 1 (lowest) to 10 (highest).
    pub priority: u8,
    /// Minimum delay that had to pass before this opportunity became eligible.
    pub delay_hours: f64,
    /// Human-readable context handed to the prompt.
    pub context: String,
}

impl EngagementOpportunity {
    /// Idempotency key: one response per (entry, persona, reason).
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.entry_id, self.persona, self.reason)
    }
}
