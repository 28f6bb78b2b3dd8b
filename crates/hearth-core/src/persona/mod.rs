//! Persona selection.
//!
//! [`PersonaSelector`] decides how many personas comment on an entry, picks
//! them by keyword affinity and decides whether anyone replies to a comment.

mod selector;
mod strengths;

pub use selector::{ActiveHours, InteractionCounts, PersonaConfig, PersonaSelector, TierBounds};
pub use strengths::StrengthsTable;
