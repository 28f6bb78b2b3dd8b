//! Static persona keyword strengths.

use serde::{Deserialize, Serialize};

use crate::types::Persona;

/// Keyword cues per persona, matched as lowercase substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthsTable {
    pub pulse: Vec<String>,
    pub sage: Vec<String>,
    pub spark: Vec<String>,
    pub anchor: Vec<String>,
}

impl Default for StrengthsTable {
    fn default() -> Self {
        Self {
            pulse: words(&["feel", "feeling", "emotion", "today", "mood", "heart"]),
            sage: words(&[
                "pattern",
                "reflect",
                "why",
                "always",
                "understand",
                "meaning",
                "lately",
                "again",
            ]),
            spark: words(&[
                "motivat", "energy", "goal", "excited", "start", "try", "momentum", "tired",
            ]),
            anchor: words(&[
                "anxious", "overwhelm", "stress", "panic", "calm", "ground", "safe", "worry",
            ]),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl StrengthsTable {
    /// Cues for one persona.
    pub fn keywords(&self, persona: Persona) -> &[String] {
        match persona {
            Persona::Pulse => &self.pulse,
            Persona::Sage => &self.sage,
            Persona::Spark => &self.spark,
            Persona::Anchor => &self.anchor,
        }
    }

    /// Number of a persona's cues present in already-lowercased text.
    pub fn affinity(&self, persona: Persona, lowered: &str) -> f32 {
        self.keywords(persona)
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .count() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_counts_matches() {
        let table = StrengthsTable::default();
        let text = "i keep noticing the same pattern again and i want to understand why";
        assert_eq!(table.affinity(Persona::Sage, text), 4.0);
        assert_eq!(table.affinity(Persona::Anchor, text), 0.0);
    }

    #[test]
    fn test_stems_match() {
        let table = StrengthsTable::default();
        assert_eq!(table.affinity(Persona::Spark, "lost all motivation"), 1.0);
        assert_eq!(table.affinity(Persona::Anchor, "so overwhelmed"), 1.0);
    }
}
