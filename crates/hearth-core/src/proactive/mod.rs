//! Proactive engagement.
//!
//! Scans each user's recent entries for moments worth a delayed follow-up
//! (high stress, low mood, a recurring pattern, work worries or an entry
//! with a single voice so far), executes the best few per cycle through the
//! generation engine and saves them back idempotently.

mod config;
mod detector;
mod executor;
mod scheduler;

pub use config::{preferred_personas, KindRule, KindRules, ProactiveConfig};
pub use detector::find_opportunities;
pub use executor::{CycleReport, ExecutionOutcome, ProactiveScheduler, UserCycle};
pub use scheduler::{EngagementScheduler, EngagementSchedulerConfig};
