//! Proactive engagement settings.

use serde::{Deserialize, Serialize};

use crate::types::{EngagementReason, Persona};

/// Priority and minimum delay for one opportunity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindRule {
    /// 1 (lowest) to 10 (highest).
    pub priority: u8,
    /// Minutes that must pass after the entry before this kind fires.
    pub min_delay_minutes: u64,
}

impl KindRule {
    /// Create a rule.
    pub const fn new(priority: u8, min_delay_minutes: u64) -> Self {
        Self {
            priority,
            min_delay_minutes,
        }
    }

    /// Minimum delay in hours.
    pub fn delay_hours(&self) -> f64 {
        self.min_delay_minutes as f64 / 60.0
    }
}

/// One rule per opportunity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindRules {
    pub high_stress_checkin: KindRule,
    pub low_mood_checkin: KindRule,
    pub pattern_followup: KindRule,
    pub work_followup: KindRule,
    pub second_perspective: KindRule,
}

impl Default for KindRules {
    fn default() -> Self {
        Self {
            high_stress_checkin: KindRule::new(9, 30),
            low_mood_checkin: KindRule::new(8, 45),
            pattern_followup: KindRule::new(7, 60),
            work_followup: KindRule::new(6, 90),
            second_perspective: KindRule::new(4, 90),
        }
    }
}

impl KindRules {
    /// Rule for a kind.
    pub fn get(&self, reason: EngagementReason) -> KindRule {
        match reason {
            EngagementReason::HighStressCheckin => self.high_stress_checkin,
            EngagementReason::LowMoodCheckin => self.low_mood_checkin,
            EngagementReason::PatternFollowup => self.pattern_followup,
            EngagementReason::WorkFollowup => self.work_followup,
            EngagementReason::SecondPerspective => self.second_perspective,
        }
    }

    /// Mutable rule for a kind.
    pub fn get_mut(&mut self, reason: EngagementReason) -> &mut KindRule {
        match reason {
            EngagementReason::HighStressCheckin => &mut self.high_stress_checkin,
            EngagementReason::LowMoodCheckin => &mut self.low_mood_checkin,
            EngagementReason::PatternFollowup => &mut self.pattern_followup,
            EngagementReason::WorkFollowup => &mut self.work_followup,
            EngagementReason::SecondPerspective => &mut self.second_perspective,
        }
    }
}

/// Which persona should carry a kind, most preferred first.
///
/// Second perspectives have no preference and take any unused persona.
pub fn preferred_personas(reason: EngagementReason) -> &'static [Persona] {
    match reason {
        EngagementReason::HighStressCheckin => &[Persona::Anchor, Persona::Pulse],
        EngagementReason::LowMoodCheckin => &[Persona::Pulse, Persona::Anchor],
        EngagementReason::PatternFollowup => &[Persona::Sage],
        EngagementReason::WorkFollowup => &[Persona::Spark],
        EngagementReason::SecondPerspective => &[],
    }
}

/// Proactive scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProactiveConfig {
    /// How far back a scan looks.
    pub lookback_days: i64,
    /// Opportunities executed per user per cycle.
    pub batch_size: usize,
    /// Entries with this many responses are left alone.
    pub max_responses_per_entry: usize,
    pub kinds: KindRules,
    /// Stress at or above this triggers a check-in.
    pub high_stress_threshold: f32,
    /// Mood at or below this triggers a check-in.
    pub low_mood_threshold: f32,
    /// Recent entries examined for cross-entry patterns.
    pub pattern_window: usize,
    /// High-stress entries in the window that make a pattern.
    pub pattern_high_stress_count: usize,
    /// Low mood or energy entries in the window that make a pattern.
    pub pattern_low_count: usize,
    /// Mood or energy at or below this counts as low for patterns.
    pub pattern_low_threshold: f32,
    /// Whole-word work cues.
    pub work_keywords: Vec<String>,
    /// Users processed concurrently in one cycle.
    pub max_concurrent_users: usize,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            lookback_days: 5,
            batch_size: 5,
            max_responses_per_entry: 4,
            kinds: KindRules::default(),
            high_stress_threshold: 8.0,
            low_mood_threshold: 3.0,
            pattern_window: 5,
            pattern_high_stress_count: 3,
            pattern_low_count: 2,
            pattern_low_threshold: 4.0,
            work_keywords: [
                "work", "working", "worked", "job", "boss", "deadline", "deadlines", "meeting",
                "meetings", "project", "office", "coworker", "colleague", "career", "shift",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            max_concurrent_users: 4,
        }
    }
}

impl ProactiveConfig {
    /// Builder: set one kind's minimum delay.
    pub fn with_min_delay(mut self, reason: EngagementReason, minutes: u64) -> Self {
        self.kinds.get_mut(reason).min_delay_minutes = minutes;
        self
    }

    /// Builder: set the lookback window.
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priorities_are_ordered() {
        let kinds = KindRules::default();
        let order = [
            EngagementReason::HighStressCheckin,
            EngagementReason::LowMoodCheckin,
            EngagementReason::PatternFollowup,
            EngagementReason::WorkFollowup,
            EngagementReason::SecondPerspective,
        ];
        for pair in order.windows(2) {
            assert!(kinds.get(pair[0]).priority > kinds.get(pair[1]).priority);
        }
    }

    #[test]
    fn test_with_min_delay() {
        let config = ProactiveConfig::default().with_min_delay(EngagementReason::HighStressCheckin, 120);
        assert_eq!(config.kinds.high_stress_checkin.min_delay_minutes, 120);
        assert_eq!(config.kinds.high_stress_checkin.delay_hours(), 2.0);
    }
}
