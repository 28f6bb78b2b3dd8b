//! How many personas respond, and which.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::StrengthsTable;
use crate::types::{
    CommentAuthor, ExistingResponse, InteractionLevel, JournalEntry, Persona, Reaction,
    SubscriptionTier, UserComment, UserPreferences,
};

/// Base responder count per interaction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionCounts {
    pub quiet: usize,
    pub balanced: usize,
    pub active: usize,
    pub high: usize,
}

impl Default for InteractionCounts {
    fn default() -> Self {
        Self {
            quiet: 1,
            balanced: 2,
            active: 3,
            high: 4,
        }
    }
}

impl InteractionCounts {
    /// Base count for a level.
    pub fn for_level(&self, level: InteractionLevel) -> usize {
        match level {
            InteractionLevel::Quiet => self.quiet,
            InteractionLevel::Balanced => self.balanced,
            InteractionLevel::Active => self.active,
            InteractionLevel::High => self.high,
        }
    }
}

/// Responder bounds and persona availability for a subscription tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBounds {
    pub min: usize,
    pub max: usize,
    pub personas: Vec<Persona>,
}

/// Hours (UTC) when users tend to read replies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveHours {
    /// Inclusive.
    pub start_hour: u32,
    /// Exclusive. May be below `start_hour` to wrap past midnight.
    pub end_hour: u32,
    pub boost: f32,
}

impl Default for ActiveHours {
    fn default() -> Self {
        Self {
            start_hour: 18,
            end_hour: 22,
            boost: 0.5,
        }
    }
}

impl ActiveHours {
    /// Whether `hour` falls in the window.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Persona selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub strengths: StrengthsTable,
    pub base_counts: InteractionCounts,
    pub free: TierBounds,
    pub premium: TierBounds,
    pub active_hours: ActiveHours,
    /// How many recent AI comments feed the engagement boost.
    pub engagement_window: usize,
    /// Ambivalence and conflict cues for the content boost.
    pub ambivalence_cues: Vec<String>,
    /// Entries longer than this get the content boost.
    pub long_entry_chars: usize,
    /// Stress at or above this gets a single responder.
    pub distress_stress: f32,
    /// Mood at or below this gets a single responder.
    pub distress_mood: f32,
    /// Upper bound of the random score added per persona.
    pub jitter: f32,
    /// Chance of replying to a comment with no topical match.
    pub reply_chance: f64,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            strengths: StrengthsTable::default(),
            base_counts: InteractionCounts::default(),
            free: TierBounds {
                min: 1,
                max: 2,
                personas: vec![Persona::Pulse, Persona::Sage],
            },
            premium: TierBounds {
                min: 1,
                max: 4,
                personas: Persona::all(),
            },
            active_hours: ActiveHours::default(),
            engagement_window: 10,
            ambivalence_cues: [
                "but",
                "however",
                "although",
                "on the other hand",
                "mixed feelings",
                "torn",
                "conflicted",
                "not sure",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            long_entry_chars: 500,
            distress_stress: 9.0,
            distress_mood: 2.0,
            jitter: 0.3,
            reply_chance: 0.5,
        }
    }
}

impl PersonaConfig {
    /// Bounds for a tier.
    pub fn bounds(&self, tier: SubscriptionTier) -> &TierBounds {
        match tier {
            SubscriptionTier::Free => &self.free,
            SubscriptionTier::Premium => &self.premium,
        }
    }
}

/// Decides how many personas respond to an entry and which ones.
///
/// The random source is injectable: [`PersonaSelector::with_seed`] makes
/// selection deterministic.
pub struct PersonaSelector {
    config: PersonaConfig,
    rng: Mutex<StdRng>,
}

impl PersonaSelector {
    /// Create a selector seeded from entropy.
    pub fn new(config: PersonaConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a selector with a fixed seed.
    pub fn with_seed(config: PersonaConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Selector settings.
    pub fn config(&self) -> &PersonaConfig {
        &self.config
    }

    /// Configured reply chance as a valid probability; NaN counts as never.
    fn reply_chance(&self) -> f64 {
        let chance = self.config.reply_chance;
        if chance.is_nan() {
            0.0
        } else {
            chance.clamp(0.0, 1.0)
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| {
            warn!("Persona rng lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Personas a tier may use.
    pub fn available_personas(&self, tier: SubscriptionTier) -> Vec<Persona> {
        self.config.bounds(tier).personas.clone()
    }

    /// Whether the entry signals enough distress for a single responder.
    pub fn is_distressed(&self, entry: &JournalEntry) -> bool {
        entry.stress_level >= self.config.distress_stress || entry.mood_level <= self.config.distress_mood
    }

    /// Positive share of reactions to the user's most recent AI comments.
    pub fn engagement_boost(&self, history: &[ExistingResponse]) -> f32 {
        let mut recent: Vec<&ExistingResponse> = history.iter().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(self.config.engagement_window);

        if recent.is_empty() {
            return 0.0;
        }
        let positive = recent
            .iter()
            .filter(|r| r.reaction == Some(Reaction::Positive))
            .count();
        positive as f32 / recent.len() as f32
    }

    /// 0.5 for ambivalence language plus 0.5 for a long entry.
    pub fn complexity_boost(&self, content: &str) -> f32 {
        let lowered = content.to_lowercase();
        let mut boost: f32 = 0.0;
        if self
            .config
            .ambivalence_cues
            .iter()
            .any(|cue| contains_phrase(&lowered, cue))
        {
            boost += 0.5;
        }
        if content.chars().count() > self.config.long_entry_chars {
            boost += 0.5;
        }
        boost.min(1.0)
    }

    /// Active-hours boost at `now`.
    pub fn time_boost(&self, now: DateTime<Utc>) -> f32 {
        if self.config.active_hours.contains(now.hour()) {
            self.config.active_hours.boost
        } else {
            0.0
        }
    }

    /// How many personas should respond to `entry`.
    ///
    /// Base count for the interaction level plus the floored sum of the
    /// engagement, content and time boosts, clamped to the tier bounds and
    /// to the personas available. A distressed user always gets exactly one.
    pub fn count_responders(
        &self,
        entry: &JournalEntry,
        prefs: &UserPreferences,
        history: &[ExistingResponse],
        now: DateTime<Utc>,
    ) -> usize {
        if self.is_distressed(entry) {
            debug!(entry_id = %entry.id, "Distress signals, single responder");
            return 1;
        }

        let bounds = self.config.bounds(prefs.tier);
        let base = self.config.base_counts.for_level(prefs.interaction_level);
        let boosts = self.engagement_boost(history)
            + self.complexity_boost(&entry.content)
            + self.time_boost(now);
        let raw = base + boosts.floor() as usize;

        let max = bounds.max.min(bounds.personas.len()).max(1);
        let count = raw.clamp(bounds.min.min(max), max);
        debug!(
            entry_id = %entry.id,
            base,
            boosts,
            count,
            "Responder count"
        );
        count
    }

    /// Pick `n` personas from `available`, best keyword affinity first.
    ///
    /// Each score gets a small random jitter. Pulse leads whenever it is
    /// picked.
    pub fn choose_personas(
        &self,
        entry: &JournalEntry,
        available: &[Persona],
        n: usize,
    ) -> Vec<Persona> {
        let lowered = entry.content.to_lowercase();
        let mut scored: Vec<(Persona, f32)> = {
            let mut rng = self.rng();
            available
                .iter()
                .map(|persona| {
                    let jitter = if self.config.jitter.is_finite() && self.config.jitter > 0.0 {
                        rng.gen_range(0.0..self.config.jitter)
                    } else {
                        0.0
                    };
                    (*persona, self.config.strengths.affinity(*persona, &lowered) + jitter)
                })
                .collect()
        };

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut chosen: Vec<Persona> = scored.into_iter().take(n).map(|(p, _)| p).collect();

        if let Some(idx) = chosen.iter().position(|p| p.is_house()) {
            let house = chosen.remove(idx);
            chosen.insert(0, house);
        }
        chosen
    }

    /// Which persona, if any, replies to a comment.
    ///
    /// Never replies to a persona's own comment. Prefers the unused persona
    /// whose cues best match the comment; with no match, replies with a
    /// random unused persona at `reply_chance`.
    pub fn should_respond_to_comment(
        &self,
        comment: &UserComment,
        available: &[Persona],
        responded: &[Persona],
    ) -> Option<Persona> {
        if let CommentAuthor::Persona(_) = comment.author {
            return None;
        }

        let unused: Vec<Persona> = available
            .iter()
            .copied()
            .filter(|p| !responded.contains(p))
            .collect();
        if unused.is_empty() {
            return None;
        }

        let lowered = comment.text.to_lowercase();
        let topical = unused
            .iter()
            .map(|p| (*p, self.config.strengths.affinity(*p, &lowered)))
            .filter(|(_, score)| *score > 0.0)
            .fold(None, |best: Option<(Persona, f32)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            });
        if let Some((persona, _)) = topical {
            return Some(persona);
        }

        let mut rng = self.rng();
        if rng.gen_bool(self.reply_chance()) {
            unused.choose(&mut *rng).copied()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for PersonaSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaSelector")
            .field("config", &self.config)
            .finish()
    }
}

/// Whole-word match for single words, substring match for phrases.
fn contains_phrase(lowered: &str, cue: &str) -> bool {
    if cue.contains(' ') {
        return lowered.contains(cue);
    }
    lowered
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|word| word == cue)
}
