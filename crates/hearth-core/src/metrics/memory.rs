//! Mutex-backed in-memory metrics store.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use super::UsageMetrics;
use crate::routing::CostLimit;
use crate::traits::MetricsStore;

#[derive(Debug, Default)]
struct Buckets {
    daily: UsageMetrics,
    monthly_cost: f64,
    /// Held by in-flight requests; survives resets until settled.
    reserved: f64,
}

impl Buckets {
    fn charge(&mut self, tokens: u64, cost: f64) {
        self.daily.total_requests += 1;
        self.daily.tokens_used += tokens;
        self.daily.total_cost += cost;
        self.monthly_cost += cost;
    }

    fn unhold(&mut self, reserved: f64) {
        self.reserved = (self.reserved - reserved).max(0.0);
    }
}

/// In-memory [`MetricsStore`].
///
/// Every operation runs under one mutex and never awaits while holding it,
/// so each update is applied entirely or not at all.
#[derive(Debug)]
pub struct InMemoryMetricsStore {
    buckets: Mutex<Buckets>,
}

impl InMemoryMetricsStore {
    /// Create a store with the given daily and monthly ceilings.
    pub fn new(daily_limit: f64, monthly_limit: f64) -> Self {
        Self {
            buckets: Mutex::new(Buckets {
                daily: UsageMetrics::with_limits(daily_limit, monthly_limit),
                monthly_cost: 0.0,
                reserved: 0.0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Metrics lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for InMemoryMetricsStore {
    fn default() -> Self {
        Self::new(5.0, 100.0)
    }
}

impl MetricsStore for InMemoryMetricsStore {
    fn record_request(&self, tokens: u64, cost: f64) {
        self.lock().charge(tokens, cost);
    }

    fn try_reserve(&self, cost: f64, daily_limit: f64, monthly_limit: f64) -> Result<(), CostLimit> {
        let mut buckets = self.lock();
        if buckets.daily.total_cost + buckets.reserved + cost >= daily_limit {
            return Err(CostLimit::Daily);
        }
        if buckets.monthly_cost + buckets.reserved + cost >= monthly_limit {
            return Err(CostLimit::Monthly);
        }
        buckets.reserved += cost;
        Ok(())
    }

    fn settle_reservation(&self, reserved: f64, tokens: u64, cost: f64) {
        let mut buckets = self.lock();
        buckets.unhold(reserved);
        buckets.charge(tokens, cost);
    }

    fn release_reservation(&self, reserved: f64) {
        self.lock().unhold(reserved);
    }

    fn reserved_cost(&self) -> f64 {
        self.lock().reserved
    }

    fn record_cache_hit(&self, cost: f64, saved: f64) {
        let mut buckets = self.lock();
        buckets.daily.cache_hits += 1;
        buckets.daily.total_cost += cost;
        buckets.daily.cost_savings += saved;
        buckets.monthly_cost += cost;
    }

    fn record_cache_miss(&self) {
        self.lock().daily.cache_misses += 1;
    }

    fn record_fallback(&self) {
        self.lock().daily.fallback_used += 1;
    }

    fn daily_cost(&self) -> f64 {
        self.lock().daily.total_cost
    }

    fn monthly_cost(&self) -> f64 {
        self.lock().monthly_cost
    }

    fn snapshot(&self) -> UsageMetrics {
        self.lock().daily.clone()
    }

    fn reset_daily(&self) -> UsageMetrics {
        let mut buckets = self.lock();
        let fresh = UsageMetrics::with_limits(buckets.daily.daily_limit, buckets.daily.monthly_limit);
        let previous = std::mem::replace(&mut buckets.daily, fresh);
        debug!(
            requests = previous.total_requests,
            cost = previous.total_cost,
            "Daily usage bucket reset"
        );
        previous
    }

    fn reset_monthly(&self) -> f64 {
        let mut buckets = self.lock();
        std::mem::replace(&mut buckets.monthly_cost, 0.0)
    }
}
