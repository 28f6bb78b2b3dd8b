//! Generation engine.
//!
//! Orchestrates one persona response end to end: complexity classification,
//! cache lookup, cost-limit check, model selection, the provider call with
//! bounded retry, safety validation and cache store. Any failure along the
//! way ends in the emergency fallback, never in an error.

mod generator;
mod prompts;
mod retry;
mod signals;

pub use generator::{GenerationEngine, GenerationOutcome, GenerationRequest};
pub use prompts::{entry_content, system_prompt, FollowUpContext};
pub use retry::RetryPolicy;
pub use signals::{wellness_score, BurnoutRisk, WellnessSignals};
