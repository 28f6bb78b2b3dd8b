//! Safety validation and response formatting.
//!
//! Both halves are pure: they judge or shape text that already exists and
//! never call the completion service.
//!
//! - [`SafetyValidator`] checks model output against configurable phrase
//!   lists (harmful content, medical advice, disrespectful tone) and length
//!   bounds. Any failure routes the caller to [`emergency_fallback`].
//! - [`ResponseFormatter`] turns raw text into a [`crate::types::ResponseResult`]
//!   with a follow-up question, suggested actions and a confidence score.

mod formatter;
mod validator;

pub use formatter::{emergency_fallback, ActionRule, FormatterConfig, ResponseFormatter};
pub use formatter::{EMERGENCY_ACTIONS, EMERGENCY_CONFIDENCE, EMERGENCY_MESSAGE};
pub use validator::{SafetyConfig, SafetyIssue, SafetyValidator, SafetyVerdict};
