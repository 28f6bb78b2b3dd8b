//! Structures raw model output into a [`ResponseResult`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{FallbackReason, ResponseResult};

// Models sometimes sign their reply with the persona name ("Pulse:", "**Sage:**").
static SPEAKER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?(?:pulse|sage|spark|anchor)(?:\*\*)?\s*:(?:\*\*)?\s*").unwrap()
});

/// Fixed, hand-authored supportive message used when generation cannot be trusted.
pub const EMERGENCY_MESSAGE: &str = "Thank you for sharing this with me. Whatever you're feeling right now matters, and you don't have to carry it alone. Let's take this one moment at a time.";

/// Suggested actions attached to the emergency message.
pub const EMERGENCY_ACTIONS: [&str; 2] = ["Take a few deep breaths", "Reach out to someone you trust"];

/// Confidence reported for the emergency message.
pub const EMERGENCY_CONFIDENCE: f32 = 0.5;

const BASE_CONFIDENCE: f32 = 0.7;
const MAX_CONFIDENCE: f32 = 0.95;
const LENGTH_BONUS_CHARS: usize = 50;

/// Build the emergency fallback response, tagged with why it was used.
pub fn emergency_fallback(reason: FallbackReason, latency_ms: u64) -> ResponseResult {
    ResponseResult {
        message: EMERGENCY_MESSAGE.to_string(),
        confidence_score: EMERGENCY_CONFIDENCE,
        latency_ms,
        follow_up_question: None,
        suggested_actions: EMERGENCY_ACTIONS.iter().map(|a| a.to_string()).collect(),
        fallback_reason: Some(reason),
    }
}

/// Keyword → suggested action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRule {
    /// Matched as lowercase substrings, so stems like "exhaust" work.
    pub keywords: Vec<String>,
    pub action: String,
}

impl ActionRule {
    fn new(keywords: &[&str], action: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            action: action.to_string(),
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Formatter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub action_rules: Vec<ActionRule>,
    /// Used to pad the action list when too few rules match.
    pub default_actions: Vec<String>,
    pub min_actions: usize,
    pub max_actions: usize,
    /// Shorter sentences are not considered as follow-up questions.
    pub min_question_chars: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            action_rules: vec![
                ActionRule::new(
                    &["stress", "overwhelm", "anxious", "pressure"],
                    "Try a two-minute box-breathing exercise",
                ),
                ActionRule::new(
                    &["tired", "exhaust", "drained", "sleep"],
                    "Give yourself permission to rest tonight",
                ),
                ActionRule::new(
                    &["work", "deadline", "project", "meeting"],
                    "Break your next task into one small step",
                ),
            ],
            default_actions: vec![
                "Take a short mindful walk".to_string(),
                "Write down one thing that went okay today".to_string(),
            ],
            min_actions: 2,
            max_actions: 3,
            min_question_chars: 10,
        }
    }
}

/// Turns raw model text into a structured response.
#[derive(Debug, Clone, Default)]
pub struct ResponseFormatter {
    config: FormatterConfig,
}

impl ResponseFormatter {
    /// Create a formatter.
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// The text a caller would see: trimmed, leading persona label removed.
    ///
    /// Validate this rather than the raw output.
    pub fn clean(&self, raw: &str) -> String {
        SPEAKER_LABEL.replace(raw.trim(), "").trim().to_string()
    }

    /// Structure `raw` into a [`ResponseResult`].
    ///
    /// - follow-up question: first substantial sentence ending in the last
    ///   quarter of the text that ends with `?`
    /// - suggested actions: keyword lookup, padded with defaults to 2-3
    /// - confidence: 0.7, +0.1 for ≥50 chars, +0.1 for a follow-up,
    ///   +0.05 for ≥2 actions, capped at 0.95
    pub fn parse_response(&self, raw: &str, latency_ms: u64) -> ResponseResult {
        let message = self.clean(raw);
        let follow_up_question = self.extract_follow_up(&message);
        let suggested_actions = self.suggest_actions(&message);

        let mut confidence = BASE_CONFIDENCE;
        if message.chars().count() >= LENGTH_BONUS_CHARS {
            confidence += 0.1;
        }
        if follow_up_question.is_some() {
            confidence += 0.1;
        }
        if suggested_actions.len() >= 2 {
            confidence += 0.05;
        }

        ResponseResult {
            message,
            confidence_score: confidence.min(MAX_CONFIDENCE),
            latency_ms,
            follow_up_question,
            suggested_actions,
            fallback_reason: None,
        }
    }

    fn extract_follow_up(&self, text: &str) -> Option<String> {
        let last_quarter_start = text.len() * 3 / 4;

        split_sentences(text)
            .into_iter()
            .filter(|(end, _)| *end > last_quarter_start)
            .map(|(_, sentence)| sentence)
            .find(|sentence| {
                sentence.chars().count() >= self.config.min_question_chars && sentence.ends_with('?')
            })
            .map(str::to_string)
    }

    fn suggest_actions(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut actions: Vec<String> = Vec::new();

        for rule in &self.config.action_rules {
            if rule.matches(&lowered) && !actions.contains(&rule.action) {
                actions.push(rule.action.clone());
            }
        }
        actions.truncate(self.config.max_actions);

        for default in &self.config.default_actions {
            if actions.len() >= self.config.min_actions {
                break;
            }
            if !actions.contains(default) {
                actions.push(default.clone());
            }
        }

        actions
    }
}

/// Split into sentences, returning each with its end byte offset.
fn split_sentences(text: &str) -> Vec<(usize, &str)> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = idx + ch.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push((end, sentence));
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push((text.len(), tail));
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::{SafetyConfig, SafetyValidator};

    fn formatter() -> ResponseFormatter {
        ResponseFormatter::default()
    }

    #[test]
    fn test_follow_up_taken_from_last_quarter() {
        let raw = "It sounds like the deadline pressure really built up this week. \
                   You still made space to write about it, which matters. \
                   What is one thing you could let go of tomorrow?";
        let result = formatter().parse_response(raw, 120);
        assert_eq!(
            result.follow_up_question.as_deref(),
            Some("What is one thing you could let go of tomorrow?")
        );
    }

    #[test]
    fn test_early_question_is_not_follow_up() {
        let raw = "How are you holding up? It sounds like a long day, and you handled a lot \
                   of it with patience and care. Rest well tonight and be gentle with yourself.";
        let result = formatter().parse_response(raw, 10);
        assert!(result.follow_up_question.is_none());
    }

    #[test]
    fn test_short_question_is_not_substantial() {
        let raw = "You wrote a lot about the week and how it felt to push through. Okay?";
        let result = formatter().parse_response(raw, 10);
        assert!(result.follow_up_question.is_none());
    }

    #[test]
    fn test_speaker_label_is_stripped() {
        let result = formatter().parse_response("**Pulse:** That sounds like a heavy day to carry.", 10);
        assert_eq!(result.message, "That sounds like a heavy day to carry.");

        let result = formatter().parse_response("Sage: patterns repeat until we notice them.", 10);
        assert_eq!(result.message, "patterns repeat until we notice them.");

        // Only a leading label counts.
        let raw = "Ask your inner Spark: what would help right now?";
        assert_eq!(formatter().parse_response(raw, 10).message, raw);
    }

    #[test]
    fn test_clean_strips_label_before_length_checks() {
        let validator = SafetyValidator::new(&SafetyConfig::default()).unwrap();
        let raw = "**Pulse:** Rest now, okay.";
        assert!(validator.validate(raw).is_safe);

        let cleaned = formatter().clean(raw);
        assert_eq!(cleaned, "Rest now, okay.");
        assert!(!validator.validate(&cleaned).is_safe);
    }

    #[test]
    fn test_actions_from_keywords() {
        let raw = "Feeling overwhelmed and tired after that work deadline is completely understandable.";
        let result = formatter().parse_response(raw, 10);
        assert_eq!(result.suggested_actions.len(), 3);
        assert_eq!(result.suggested_actions[0], "Try a two-minute box-breathing exercise");
        assert_eq!(result.suggested_actions[1], "Give yourself permission to rest tonight");
        assert_eq!(result.suggested_actions[2], "Break your next task into one small step");
    }

    #[test]
    fn test_actions_padded_with_defaults() {
        let result = formatter().parse_response("What a lovely afternoon in the garden you had.", 10);
        assert_eq!(
            result.suggested_actions,
            vec![
                "Take a short mindful walk".to_string(),
                "Write down one thing that went okay today".to_string()
            ]
        );

        let result = formatter().parse_response("Sounds like you are tired of waiting around.", 10);
        assert_eq!(result.suggested_actions.len(), 2);
        assert_eq!(result.suggested_actions[0], "Give yourself permission to rest tonight");
    }

    #[test]
    fn test_confidence_scoring() {
        // Short, no question: 0.7 + 0.05 for the padded actions.
        let result = formatter().parse_response("Glad you wrote today.", 10);
        assert!((result.confidence_score - 0.75).abs() < 1e-6);

        // Long with question: capped at 0.95.
        let raw = "It sounds like a heavy but meaningful day, and you showed up for yourself. \
                   What felt most important to you?";
        let result = formatter().parse_response(raw, 10);
        assert!((result.confidence_score - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_emergency_fallback_is_safe_and_fixed() {
        let validator = SafetyValidator::new(&SafetyConfig::default()).unwrap();
        let fallback = emergency_fallback(FallbackReason::UnsafeContent, 42);

        assert!(!fallback.message.is_empty());
        assert!(validator.validate(&fallback.message).is_safe);
        assert_eq!(fallback.suggested_actions.len(), 2);
        assert_eq!(fallback.confidence_score, EMERGENCY_CONFIDENCE);
        assert_eq!(fallback.latency_ms, 42);
        assert_eq!(fallback.fallback_reason, Some(FallbackReason::UnsafeContent));
        assert!(fallback.is_fallback());
    }

    #[test]
    fn test_split_sentences_handles_decimals_and_tail() {
        let sentences = split_sentences("Mood was 6.5 today. Not bad! still thinking");
        let texts: Vec<&str> = sentences.iter().map(|(_, s)| *s).collect();
        assert_eq!(texts, vec!["Mood was 6.5 today.", "Not bad!", "still thinking"]);
    }
}
