//! Request complexity classification.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ComplexityTier;

/// Extra context requested alongside the entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplexityFlags {
    /// Caller wants cross-entry pattern analysis.
    pub pattern_analysis: bool,
    /// Caller pinned a specific persona.
    pub forced_persona: bool,
}

impl ComplexityFlags {
    fn any(&self) -> bool {
        self.pattern_analysis || self.forced_persona
    }
}

/// Character thresholds between tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityThresholds {
    /// Content shorter than this (and no flags) is simple.
    pub simple_below_chars: usize,
    /// Content at least this long is complex.
    pub complex_from_chars: usize,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            simple_below_chars: 100,
            complex_from_chars: 300,
        }
    }
}

/// Classify a request. Never fails: unusable thresholds yield `Moderate`.
pub fn classify_complexity(
    content: &str,
    flags: ComplexityFlags,
    thresholds: &ComplexityThresholds,
) -> ComplexityTier {
    if thresholds.simple_below_chars > thresholds.complex_from_chars {
        warn!(
            simple_below = thresholds.simple_below_chars,
            complex_from = thresholds.complex_from_chars,
            "Complexity thresholds overlap, defaulting to moderate"
        );
        return ComplexityTier::Moderate;
    }

    let length = content.chars().count();
    if length >= thresholds.complex_from_chars || flags.any() {
        ComplexityTier::Complex
    } else if length < thresholds.simple_below_chars {
        ComplexityTier::Simple
    } else {
        ComplexityTier::Moderate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(content: &str, flags: ComplexityFlags) -> ComplexityTier {
        classify_complexity(content, flags, &ComplexityThresholds::default())
    }

    #[test]
    fn test_short_content_is_simple() {
        for len in [0, 1, 50, 99] {
            let content = "a".repeat(len);
            assert_eq!(classify(&content, ComplexityFlags::default()), ComplexityTier::Simple);
        }
    }

    #[test]
    fn test_long_content_is_complex() {
        for len in [300, 301, 2000] {
            let content = "a".repeat(len);
            assert_eq!(classify(&content, ComplexityFlags::default()), ComplexityTier::Complex);
        }
    }

    #[test]
    fn test_middle_is_moderate() {
        assert_eq!(
            classify(&"a".repeat(100), ComplexityFlags::default()),
            ComplexityTier::Moderate
        );
        assert_eq!(
            classify(&"a".repeat(299), ComplexityFlags::default()),
            ComplexityTier::Moderate
        );
    }

    #[test]
    fn test_flags_force_complex() {
        let pattern = ComplexityFlags {
            pattern_analysis: true,
            ..Default::default()
        };
        assert_eq!(classify("short", pattern), ComplexityTier::Complex);

        let forced = ComplexityFlags {
            forced_persona: true,
            ..Default::default()
        };
        assert_eq!(classify("short", forced), ComplexityTier::Complex);
    }

    #[test]
    fn test_bad_thresholds_default_to_moderate() {
        let thresholds = ComplexityThresholds {
            simple_below_chars: 500,
            complex_from_chars: 100,
        };
        assert_eq!(
            classify_complexity("tiny", ComplexityFlags::default(), &thresholds),
            ComplexityTier::Moderate
        );
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        // 99 multi-byte chars is still simple.
        let content = "é".repeat(99);
        assert_eq!(classify(&content, ComplexityFlags::default()), ComplexityTier::Simple);
    }
}
