//! Wellness signals computed locally from an entry's self-reported levels.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{JournalEntry, SCALE_MAX};

/// Joint burnout risk from mood, energy and stress.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BurnoutRisk {
    Low,
    Moderate,
    High,
    Critical,
}

impl BurnoutRisk {
    /// Count of mood ≤ 4, energy ≤ 4 and stress ≥ 7; 3 is critical.
    pub fn from_entry(entry: &JournalEntry) -> Self {
        let flags = [
            entry.mood_level <= 4.0,
            entry.energy_level <= 4.0,
            entry.stress_level >= 7.0,
        ];
        match flags.iter().filter(|f| **f).count() {
            3 => BurnoutRisk::Critical,
            2 => BurnoutRisk::High,
            1 => BurnoutRisk::Moderate,
            _ => BurnoutRisk::Low,
        }
    }
}

/// 40% mood, 30% energy, 30% inverted stress, clamped to `[0, 10]`.
pub fn wellness_score(entry: &JournalEntry) -> f32 {
    let score = 0.4 * entry.mood_level
        + 0.3 * entry.energy_level
        + 0.3 * (SCALE_MAX - entry.stress_level);
    score.clamp(0.0, SCALE_MAX)
}

/// Both signals together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WellnessSignals {
    pub wellness_score: f32,
    pub burnout_risk: BurnoutRisk,
}

impl WellnessSignals {
    /// Compute signals for an entry.
    pub fn from_entry(entry: &JournalEntry) -> Self {
        Self {
            wellness_score: wellness_score(entry),
            burnout_risk: BurnoutRisk::from_entry(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mood: f32, energy: f32, stress: f32) -> JournalEntry {
        JournalEntry::new("e", "u", "text").with_levels(mood, energy, stress)
    }

    #[test]
    fn test_burnout_levels() {
        assert_eq!(BurnoutRisk::from_entry(&entry(2.0, 3.0, 9.0)), BurnoutRisk::Critical);
        assert_eq!(BurnoutRisk::from_entry(&entry(4.0, 4.0, 6.0)), BurnoutRisk::High);
        assert_eq!(BurnoutRisk::from_entry(&entry(7.0, 8.0, 7.0)), BurnoutRisk::Moderate);
        assert_eq!(BurnoutRisk::from_entry(&entry(7.0, 8.0, 3.0)), BurnoutRisk::Low);
    }

    #[test]
    fn test_wellness_blend() {
        // 0.4*8 + 0.3*6 + 0.3*(10-2) = 3.2 + 1.8 + 2.4
        assert!((wellness_score(&entry(8.0, 6.0, 2.0)) - 7.4).abs() < 1e-5);
        assert!((wellness_score(&entry(10.0, 10.0, 0.0)) - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_wellness_clamped() {
        assert_eq!(wellness_score(&entry(-5.0, -5.0, 15.0)), 0.0);
        assert_eq!(wellness_score(&entry(20.0, 20.0, 0.0)), 10.0);
    }
}
