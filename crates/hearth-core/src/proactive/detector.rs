//! Opportunity detection over a user's recent history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::config::{preferred_personas, ProactiveConfig};
use crate::types::{EngagementOpportunity, EngagementReason, ExistingResponse, JournalEntry, Persona};

/// Fixed tie-break order when configured priorities are equal.
const KIND_ORDER: [EngagementReason; 5] = [
    EngagementReason::HighStressCheckin,
    EngagementReason::LowMoodCheckin,
    EngagementReason::PatternFollowup,
    EngagementReason::WorkFollowup,
    EngagementReason::SecondPerspective,
];

/// Find at most one opportunity per entry, highest priority first, capped
/// at the configured batch size.
///
/// Pure: reads the entries, their existing responses and the personas the
/// user may hear from, and decides. The cross-entry pattern is attached to
/// the most recent entry it is eligible for and nowhere else.
pub fn find_opportunities(
    entries: &[JournalEntry],
    responses: &[ExistingResponse],
    available: &[Persona],
    config: &ProactiveConfig,
    now: DateTime<Utc>,
) -> Vec<EngagementOpportunity> {
    let mut sorted: Vec<&JournalEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut by_entry: HashMap<&str, Vec<&ExistingResponse>> = HashMap::new();
    for response in responses {
        by_entry.entry(response.entry_id.as_str()).or_default().push(response);
    }

    let mut pattern = detect_pattern(&sorted, config);
    let mut opportunities = Vec::new();

    for entry in sorted {
        let existing = by_entry.get(entry.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        if existing.len() >= config.max_responses_per_entry {
            continue;
        }

        let minutes_since = entry.hours_since(now) * 60.0;
        let responded: Vec<Persona> = existing.iter().map(|r| r.persona).collect();

        let eligible: Vec<(EngagementReason, Persona)> =
            candidate_kinds(entry, existing.len(), pattern.is_some(), config)
                .into_iter()
                .filter(|reason| minutes_since >= config.kinds.get(*reason).min_delay_minutes as f64)
                .filter(|reason| !existing.iter().any(|r| r.reason == Some(*reason)))
                .filter_map(|reason| pick_persona(reason, available, &responded).map(|p| (reason, p)))
                .collect();

        let pattern_context = if eligible
            .iter()
            .any(|(reason, _)| *reason == EngagementReason::PatternFollowup)
        {
            pattern.take()
        } else {
            None
        };

        let Some((reason, persona)) = eligible.first().copied() else {
            continue;
        };
        let rule = config.kinds.get(reason);
        let context = match reason {
            EngagementReason::PatternFollowup => pattern_context.unwrap_or_default(),
            _ => describe(reason, entry, &responded, config),
        };

        debug!(entry_id = %entry.id, %reason, %persona, priority = rule.priority, "Opportunity found");
        opportunities.push(EngagementOpportunity {
            entry_id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            persona,
            reason,
            priority: rule.priority,
            delay_hours: rule.delay_hours(),
            context,
        });
    }

    // Stable: equal priorities stay newest first.
    opportunities.sort_by(|a, b| b.priority.cmp(&a.priority));
    opportunities.truncate(config.batch_size);
    opportunities
}

/// Kinds an entry qualifies for, best first.
fn candidate_kinds(
    entry: &JournalEntry,
    response_count: usize,
    pattern_pending: bool,
    config: &ProactiveConfig,
) -> Vec<EngagementReason> {
    let mut kinds: Vec<EngagementReason> = KIND_ORDER
        .iter()
        .copied()
        .filter(|reason| match reason {
            EngagementReason::HighStressCheckin => entry.stress_level >= config.high_stress_threshold,
            EngagementReason::LowMoodCheckin => entry.mood_level <= config.low_mood_threshold,
            EngagementReason::PatternFollowup => pattern_pending,
            EngagementReason::WorkFollowup => mentions_work(&entry.content, config),
            EngagementReason::SecondPerspective => response_count == 1,
        })
        .collect();

    kinds.sort_by(|a, b| config.kinds.get(*b).priority.cmp(&config.kinds.get(*a).priority));
    kinds
}

/// Sustained stress or low mood/energy across the most recent entries.
fn detect_pattern(newest_first: &[&JournalEntry], config: &ProactiveConfig) -> Option<String> {
    let window: Vec<&&JournalEntry> = newest_first.iter().take(config.pattern_window).collect();

    let stressed = window
        .iter()
        .filter(|e| e.stress_level >= config.high_stress_threshold)
        .count();
    if stressed >= config.pattern_high_stress_count {
        return Some(format!(
            "{} of the last {} entries show high stress",
            stressed,
            window.len()
        ));
    }

    let low = window
        .iter()
        .filter(|e| {
            e.mood_level <= config.pattern_low_threshold || e.energy_level <= config.pattern_low_threshold
        })
        .count();
    if low >= config.pattern_low_count {
        return Some(format!(
            "{} of the last {} entries show low mood or energy",
            low,
            window.len()
        ));
    }

    None
}

fn mentions_work(content: &str, config: &ProactiveConfig) -> bool {
    let lowered = content.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| config.work_keywords.iter().any(|k| k == word))
}

/// Preferred persona for the kind, else any unused one.
fn pick_persona(
    reason: EngagementReason,
    available: &[Persona],
    responded: &[Persona],
) -> Option<Persona> {
    let usable = |p: &Persona| available.contains(p) && !responded.contains(p);
    preferred_personas(reason)
        .iter()
        .copied()
        .find(usable)
        .or_else(|| available.iter().copied().find(usable))
}

fn describe(
    reason: EngagementReason,
    entry: &JournalEntry,
    responded: &[Persona],
    config: &ProactiveConfig,
) -> String {
    match reason {
        EngagementReason::HighStressCheckin => {
            format!("Stress was {:.0}/10 when this was written", entry.stress_level)
        }
        EngagementReason::LowMoodCheckin => {
            format!("Mood was {:.0}/10 when this was written", entry.mood_level)
        }
        EngagementReason::WorkFollowup => {
            let lowered = entry.content.to_lowercase();
            let cue = config
                .work_keywords
                .iter()
                .find(|k| lowered.split(|c: char| !c.is_alphanumeric()).any(|w| w == k.as_str()))
                .map(String::as_str)
                .unwrap_or("work");
            format!("The entry talks about {}", cue)
        }
        EngagementReason::SecondPerspective => {
            let names: Vec<String> = responded.iter().map(|p| p.to_string()).collect();
            format!("Only {} has responded so far", names.join(", "))
        }
        EngagementReason::PatternFollowup => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn entry(id: &str, hours_ago: i64, mood: f32, energy: f32, stress: f32, text: &str) -> JournalEntry {
        JournalEntry::new(id, "u1", text)
            .with_levels(mood, energy, stress)
            .with_created_at(now() - Duration::hours(hours_ago))
    }

    fn scan(entries: &[JournalEntry], responses: &[ExistingResponse], config: &ProactiveConfig) -> Vec<EngagementOpportunity> {
        find_opportunities(entries, responses, &Persona::all(), config, now())
    }

    #[test]
    fn test_high_stress_scenario() {
        let config = ProactiveConfig::default().with_min_delay(EngagementReason::HighStressCheckin, 120);
        let entries = [entry("e1", 3, 6.0, 6.0, 8.0, "A packed day with little rest.")];

        let found = scan(&entries, &[], &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reason, EngagementReason::HighStressCheckin);
        assert_eq!(found[0].priority, 9);
        assert_eq!(found[0].persona, Persona::Anchor);
        assert_eq!(found[0].delay_hours, 2.0);
        assert_eq!(found[0].user_id, "u1");
    }

    #[test]
    fn test_too_recent_is_skipped() {
        let config = ProactiveConfig::default().with_min_delay(EngagementReason::HighStressCheckin, 240);
        let entries = [entry("e1", 3, 6.0, 6.0, 8.0, "A packed day.")];
        assert!(scan(&entries, &[], &config).is_empty());
    }

    #[test]
    fn test_full_entries_are_skipped() {
        let config = ProactiveConfig::default();
        let entries = [entry("e1", 10, 2.0, 6.0, 9.0, "Bad day.")];
        let responses: Vec<ExistingResponse> = [Persona::Pulse, Persona::Sage, Persona::Spark, Persona::Anchor]
            .into_iter()
            .map(|p| ExistingResponse::new("e1", p))
            .collect();
        assert!(scan(&entries, &responses, &config).is_empty());
    }

    #[test]
    fn test_one_opportunity_per_entry_highest_wins() {
        let config = ProactiveConfig::default();
        // High stress, low mood and work all match.
        let entries = [entry("e1", 5, 2.0, 6.0, 9.0, "Work was awful and my boss yelled.")];
        let found = scan(&entries, &[], &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reason, EngagementReason::HighStressCheckin);
    }

    #[test]
    fn test_satisfied_kind_falls_to_next() {
        let config = ProactiveConfig::default();
        let entries = [entry("e1", 5, 2.0, 6.0, 9.0, "Rough one.")];
        let responses = [ExistingResponse::new("e1", Persona::Anchor)
            .with_reason(EngagementReason::HighStressCheckin)];

        let found = scan(&entries, &responses, &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reason, EngagementReason::LowMoodCheckin);
        assert_eq!(found[0].persona, Persona::Pulse);
    }

    #[test]
    fn test_responded_persona_gets_alternative() {
        let config = ProactiveConfig::default();
        let entries = [entry("e1", 5, 6.0, 6.0, 9.0, "So much going on.")];
        let responses = [ExistingResponse::new("e1", Persona::Anchor)];

        let found = scan(&entries, &responses, &config);
        assert_eq!(found[0].reason, EngagementReason::HighStressCheckin);
        assert_eq!(found[0].persona, Persona::Pulse);
    }

    #[test]
    fn test_pattern_attaches_to_most_recent_eligible_entry() {
        let config = ProactiveConfig::default();
        let entries = [
            entry("e1", 2, 4.0, 6.0, 5.0, "Tired again."),
            entry("e2", 26, 3.5, 4.0, 5.0, "Couldn't get going."),
            entry("e3", 50, 6.0, 6.0, 5.0, "Better."),
        ];
        let found = scan(&entries, &[], &config);

        let patterns: Vec<_> = found
            .iter()
            .filter(|o| o.reason == EngagementReason::PatternFollowup)
            .collect();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].entry_id, "e1");
        assert_eq!(patterns[0].persona, Persona::Sage);
        assert!(patterns[0].context.contains("low mood or energy"));
    }

    #[test]
    fn test_pattern_skips_entries_too_recent() {
        let config = ProactiveConfig::default();
        let mut entries: Vec<JournalEntry> = (1..=3)
            .map(|i| entry(&format!("e{i}"), i * 24, 6.0, 6.0, 8.5, "Stressful."))
            .collect();
        // Newest entry is 10 minutes old: nothing can fire on it yet.
        entries.push(
            JournalEntry::new("fresh", "u1", "Still going.")
                .with_levels(6.0, 6.0, 8.5)
                .with_created_at(now() - Duration::minutes(10)),
        );

        let found = scan(&entries, &[], &config);
        assert!(found.iter().all(|o| o.entry_id != "fresh"));
        // The pattern is consumed by the newest eligible entry even though
        // high stress outranks it there.
        assert!(found.iter().all(|o| o.reason != EngagementReason::PatternFollowup));
    }

    #[test]
    fn test_second_perspective() {
        let config = ProactiveConfig::default();
        let entries = [entry("e1", 3, 6.0, 6.0, 4.0, "Quiet evening reading.")];
        let responses = [ExistingResponse::new("e1", Persona::Pulse)];

        let found = scan(&entries, &responses, &config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reason, EngagementReason::SecondPerspective);
        assert_ne!(found[0].persona, Persona::Pulse);
        assert!(found[0].context.contains("pulse"));

        // Not enough time yet.
        let early = [entry("e1", 1, 6.0, 6.0, 4.0, "Quiet evening reading.")];
        assert!(scan(&early, &responses, &config).is_empty());
    }

    #[test]
    fn test_work_follow_up_uses_spark_or_alternative() {
        let config = ProactiveConfig::default();
        let entries = [entry("e1", 3, 6.0, 6.0, 5.0, "Big project meeting tomorrow.")];
        let found = scan(&entries, &[], &config);
        assert_eq!(found[0].reason, EngagementReason::WorkFollowup);
        assert_eq!(found[0].persona, Persona::Spark);

        let free = [Persona::Pulse, Persona::Sage];
        let found = find_opportunities(&entries, &[], &free, &config, now());
        assert_eq!(found[0].persona, Persona::Pulse);
    }

    #[test]
    fn test_workout_is_not_work() {
        let config = ProactiveConfig::default();
        assert!(!mentions_work("Great workout this morning", &config));
        assert!(mentions_work("Long day at work.", &config));
    }

    #[test]
    fn test_sorted_and_capped() {
        let config = ProactiveConfig {
            batch_size: 2,
            ..Default::default()
        };
        let entries = [
            entry("work", 3, 6.0, 6.0, 5.0, "Deadline stress at the office."),
            entry("mood", 4, 2.0, 6.0, 5.0, "Sad."),
            entry("stress", 30, 6.0, 6.0, 9.0, "Frantic."),
        ];
        let found = scan(&entries, &[], &config);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].entry_id, "stress");
        assert_eq!(found[1].entry_id, "mood");
    }
}
