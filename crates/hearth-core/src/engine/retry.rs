//! Bounded retry policy for completion calls.

use std::time::Duration;

use backon::ExponentialBuilder;
use serde::{Deserialize, Serialize};

/// Retry policy configuration.
///
/// `max_attempts` counts the first call, so the default of 3 means at most
/// two retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, first call included.
    pub max_attempts: u32,
    /// Delay before the first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay (milliseconds).
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0_f32,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Builder: set total attempts (at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Builder: set initial and maximum delays.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay_ms = initial.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    /// Number of retries after the first call.
    pub fn max_retries(&self) -> usize {
        self.max_attempts.saturating_sub(1) as usize
    }

    /// Backoff schedule for `backon`.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_max_times(self.max_retries())
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_factor(self.multiplier)
    }
}
