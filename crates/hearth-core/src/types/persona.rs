//! Companion personas.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// A named response voice. Several personas may comment on one entry.
///
/// `Pulse` is the house persona: whenever it is selected it speaks first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Warm emotional check-ins.
    Pulse,
    /// Patterns, reflection and meaning.
    Sage,
    /// Motivation, energy and momentum.
    Spark,
    /// Grounding under stress and anxiety.
    Anchor,
}

impl Persona {
    /// All personas in declaration order.
    pub fn all() -> Vec<Persona> {
        Self::iter().collect()
    }

    /// Whether this is the house persona.
    pub fn is_house(&self) -> bool {
        matches!(self, Persona::Pulse)
    }

    /// Short voice description used when assembling prompts.
    pub fn voice(&self) -> &'static str {
        match self {
            Persona::Pulse => "a warm, attentive companion who checks in on how the user is feeling",
            Persona::Sage => "a reflective guide who notices patterns and helps the user make meaning",
            Persona::Spark => "an upbeat coach who helps the user find energy and small next steps",
            Persona::Anchor => "a calm, steady presence who helps the user ground themselves under stress",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_persona_round_trips_through_strings() {
        for persona in Persona::all() {
            let name = persona.to_string();
            assert_eq!(Persona::from_str(&name).unwrap(), persona);
        }
        assert_eq!(Persona::Anchor.to_string(), "anchor");
    }

    #[test]
    fn test_only_pulse_is_house() {
        let house: Vec<_> = Persona::all().into_iter().filter(|p| p.is_house()).collect();
        assert_eq!(house, vec![Persona::Pulse]);
    }
}
