//! Phrase-list safety validation for model output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{HearthError, HearthResult};

/// Phrase lists and length bounds for output validation.
///
/// Lists are data, not code: hosts can extend or replace them from a
/// config file without touching control flow. Matching is
/// case-insensitive on word boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Self-harm and violence cues.
    pub harmful_phrases: Vec<String>,
    /// Diagnostic or prescriptive language.
    pub medical_phrases: Vec<String>,
    /// Dismissive or insulting tone.
    pub disrespectful_phrases: Vec<String>,
    /// Shorter output is treated as malformed.
    pub min_length: usize,
    /// Longer output is treated as malformed.
    pub max_length: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            harmful_phrases: to_strings(&[
                "kill yourself",
                "killing yourself",
                "hurt yourself",
                "harm yourself",
                "self-harm",
                "cut yourself",
                "end your life",
                "end it all",
                "suicide",
                "better off dead",
                "you should die",
                "hurt them back",
                "get revenge",
                "use violence",
            ]),
            medical_phrases: to_strings(&[
                "you have depression",
                "you are clinically depressed",
                "you have an anxiety disorder",
                "you have bipolar",
                "you have adhd",
                "your diagnosis",
                "i diagnose",
                "medical diagnosis",
                "prescription",
                "prescribe",
                "dosage",
                "increase your dose",
                "stop taking your medication",
                "you should take medication",
                "antidepressants",
            ]),
            disrespectful_phrases: to_strings(&[
                "stupid",
                "pathetic",
                "idiot",
                "worthless",
                "ridiculous",
                "get over it",
                "stop whining",
                "stop complaining",
                "grow up",
                "your own fault",
            ]),
            min_length: 20,
            max_length: 2000,
        }
    }
}

fn to_strings(phrases: &[&str]) -> Vec<String> {
    phrases.iter().map(|p| p.to_string()).collect()
}

/// Why a piece of text failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SafetyIssue {
    HarmfulContent,
    MedicalAdvice,
    DisrespectfulTone,
    TooShort,
    TooLong,
}

/// Outcome of [`SafetyValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub is_safe: bool,
    pub issue: Option<SafetyIssue>,
    /// The matched text, as it appears in the input.
    pub offending_span: Option<String>,
}

impl SafetyVerdict {
    fn safe() -> Self {
        Self {
            is_safe: true,
            issue: None,
            offending_span: None,
        }
    }

    fn unsafe_because(issue: SafetyIssue, span: Option<String>) -> Self {
        Self {
            is_safe: false,
            issue: Some(issue),
            offending_span: span,
        }
    }
}

/// Compiled validator. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    harmful: Option<Regex>,
    medical: Option<Regex>,
    disrespectful: Option<Regex>,
    min_length: usize,
    max_length: usize,
}

impl SafetyValidator {
    /// Compile the phrase lists.
    pub fn new(config: &SafetyConfig) -> HearthResult<Self> {
        if config.min_length > config.max_length {
            return Err(HearthError::Configuration(format!(
                "safety min_length ({}) exceeds max_length ({})",
                config.min_length, config.max_length
            )));
        }

        Ok(Self {
            harmful: compile_phrases(&config.harmful_phrases)?,
            medical: compile_phrases(&config.medical_phrases)?,
            disrespectful: compile_phrases(&config.disrespectful_phrases)?,
            min_length: config.min_length,
            max_length: config.max_length,
        })
    }

    /// Judge text already produced by the model.
    ///
    /// Checks run in order: harmful content, medical advice, disrespectful
    /// tone, then length bounds. The first failure wins.
    pub fn validate(&self, text: &str) -> SafetyVerdict {
        let checks = [
            (&self.harmful, SafetyIssue::HarmfulContent),
            (&self.medical, SafetyIssue::MedicalAdvice),
            (&self.disrespectful, SafetyIssue::DisrespectfulTone),
        ];

        for (pattern, issue) in checks {
            if let Some(found) = pattern.as_ref().and_then(|p| p.find(text)) {
                return SafetyVerdict::unsafe_because(issue, Some(found.as_str().to_string()));
            }
        }

        let length = text.trim().chars().count();
        if length < self.min_length {
            return SafetyVerdict::unsafe_because(SafetyIssue::TooShort, None);
        }
        if length > self.max_length {
            return SafetyVerdict::unsafe_because(SafetyIssue::TooLong, None);
        }

        SafetyVerdict::safe()
    }
}

fn compile_phrases(phrases: &[String]) -> HearthResult<Option<Regex>> {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| HearthError::Configuration(format!("Invalid safety phrase list: {}", e)))
}
