//! Prompt assembly for persona responses.

use serde::{Deserialize, Serialize};

use crate::types::{EngagementReason, JournalEntry, Persona};

/// Framing for a delayed, proactive comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpContext {
    pub reason: EngagementReason,
    /// Why the scheduler picked this entry.
    pub context: String,
    pub hours_since_entry: f64,
}

impl FollowUpContext {
    /// Create follow-up framing.
    pub fn new(reason: EngagementReason, context: impl Into<String>, hours_since_entry: f64) -> Self {
        Self {
            reason,
            context: context.into(),
            hours_since_entry,
        }
    }
}

/// System prompt for a persona, with optional follow-up framing first.
pub fn system_prompt(persona: Persona, follow_up: Option<&FollowUpContext>) -> String {
    let mut prompt = String::new();

    if let Some(follow_up) = follow_up {
        prompt.push_str(&format!(
            "This is a delayed follow-up, written about {:.0} hours after the entry. \
             Acknowledge the time that has passed and gently check in. Context: {}\n\n",
            follow_up.hours_since_entry, follow_up.context
        ));
    }

    let name: &'static str = persona.into();
    prompt.push_str(&format!(
        "You are {}, {}. Respond to the user's journal entry in two to four sentences. \
         Be supportive and specific to what they wrote. Do not diagnose, prescribe or \
         give medical advice. You may end with one gentle question.",
        capitalize(name),
        persona.voice()
    ));
    prompt
}

/// Entry text plus the self-reported levels.
pub fn entry_content(entry: &JournalEntry) -> String {
    format!(
        "{}\n\n(mood {:.0}/10, energy {:.0}/10, stress {:.0}/10)",
        entry.content.trim(),
        entry.mood_level,
        entry.energy_level,
        entry.stress_level
    )
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_persona() {
        let prompt = system_prompt(Persona::Sage, None);
        assert!(prompt.starts_with("You are Sage"));
        assert!(!prompt.contains("delayed follow-up"));
    }

    #[test]
    fn test_follow_up_framing_comes_first() {
        let follow_up = FollowUpContext::new(
            EngagementReason::HighStressCheckin,
            "stress was 9/10",
            26.0,
        );
        let prompt = system_prompt(Persona::Anchor, Some(&follow_up));
        assert!(prompt.starts_with("This is a delayed follow-up"));
        assert!(prompt.contains("26 hours"));
        assert!(prompt.contains("stress was 9/10"));
        assert!(prompt.contains("You are Anchor"));
    }

    #[test]
    fn test_entry_content_includes_levels() {
        let entry = JournalEntry::new("e", "u", "  rough day  ").with_levels(3.0, 4.0, 8.0);
        let content = entry_content(&entry);
        assert!(content.starts_with("rough day\n"));
        assert!(content.contains("stress 8/10"));
    }
}
