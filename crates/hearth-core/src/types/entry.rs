//! Journal entries and the AI responses already attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EngagementReason, Persona};

/// Upper bound of the mood/energy/stress scale.
pub const SCALE_MAX: f32 = 10.0;

/// A journal entry as handed over by the entry store.
///
/// Mood, energy and stress are self-reported on a 1-10 scale. They may be
/// fractional when the client averages several check-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub mood_level: f32,
    pub energy_level: f32,
    pub stress_level: f32,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Create an entry with neutral levels (5/5/5) timestamped now.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content: content.into(),
            mood_level: 5.0,
            energy_level: 5.0,
            stress_level: 5.0,
            created_at: Utc::now(),
        }
    }

    /// Set mood, energy and stress levels.
    pub fn with_levels(mut self, mood: f32, energy: f32, stress: f32) -> Self {
        self.mood_level = mood;
        self.energy_level = energy;
        self.stress_level = stress;
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Content length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Hours elapsed between creation and `now` (never negative).
    pub fn hours_since(&self, now: DateTime<Utc>) -> f64 {
        let minutes = (now - self.created_at).num_minutes().max(0);
        minutes as f64 / 60.0
    }

    /// Mood rounded to the nearest whole point, used for cache bucketing.
    pub fn mood_bucket(&self) -> i32 {
        self.mood_level.round() as i32
    }
}

/// How the user reacted to an AI comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Positive,
    Neutral,
    Negative,
}

/// An AI response already stored against an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingResponse {
    pub id: String,
    pub entry_id: String,
    pub persona: Persona,
    /// Set when the response came from a proactive opportunity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<EngagementReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,
    pub created_at: DateTime<Utc>,
}

impl ExistingResponse {
    /// Create an immediate (non-proactive) response record.
    pub fn new(entry_id: impl Into<String>, persona: Persona) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entry_id: entry_id.into(),
            persona,
            reason: None,
            reaction: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the response as produced for an engagement reason.
    pub fn with_reason(mut self, reason: EngagementReason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Record the user's reaction.
    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.reaction = Some(reaction);
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Who wrote a comment in an entry thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "persona", rename_all = "snake_case")]
pub enum CommentAuthor {
    User,
    Persona(Persona),
}

/// A comment posted under an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserComment {
    pub author: CommentAuthor,
    pub text: String,
}

impl UserComment {
    /// A comment written by the user.
    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            author: CommentAuthor::User,
            text: text.into(),
        }
    }

    /// A comment written by an AI persona.
    pub fn from_persona(persona: Persona, text: impl Into<String>) -> Self {
        Self {
            author: CommentAuthor::Persona(persona),
            text: text.into(),
        }
    }
}
