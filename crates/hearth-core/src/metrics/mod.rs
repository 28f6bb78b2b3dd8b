//! Usage accounting: daily/monthly cost, cache and fallback counters.

mod memory;

pub use memory::InMemoryMetricsStore;

use serde::{Deserialize, Serialize};

/// Daily usage bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Billed completions (cache hits excluded).
    pub total_requests: u64,
    /// Spend in USD, cache pre-check cost included.
    pub total_cost: f64,
    pub tokens_used: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fallback_used: u64,
    /// Spend avoided by serving from cache.
    pub cost_savings: f64,
    pub daily_limit: f64,
    pub monthly_limit: f64,
}

impl UsageMetrics {
    /// Empty bucket with the given ceilings.
    pub fn with_limits(daily_limit: f64, monthly_limit: f64) -> Self {
        Self {
            daily_limit,
            monthly_limit,
            ..Default::default()
        }
    }

    /// Cache hits over all lookups; 0 when nothing was looked up.
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }

    /// Fallbacks over all answered requests (billed + cached + fallback).
    pub fn fallback_rate(&self) -> f64 {
        let answered = self.total_requests + self.cache_hits + self.fallback_used;
        if answered == 0 {
            0.0
        } else {
            self.fallback_used as f64 / answered as f64
        }
    }
}

/// Read-only view handed to the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_cost: f64,
    pub tokens_used: u64,
    pub cache_hit_rate: f64,
    pub fallback_rate: f64,
    pub cost_savings: f64,
    pub daily_remaining: f64,
    pub monthly_remaining: f64,
}

impl MetricsSnapshot {
    /// Build a snapshot from the daily bucket and the monthly spend.
    pub fn from_usage(usage: &UsageMetrics, monthly_cost: f64) -> Self {
        Self {
            total_requests: usage.total_requests,
            total_cost: usage.total_cost,
            tokens_used: usage.tokens_used,
            cache_hit_rate: usage.cache_hit_rate(),
            fallback_rate: usage.fallback_rate(),
            cost_savings: usage.cost_savings,
            daily_remaining: (usage.daily_limit - usage.total_cost).max(0.0),
            monthly_remaining: (usage.monthly_limit - monthly_cost).max(0.0),
        }
    }
}
