//! Cost-aware model selection and usage accounting.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info};

use super::{
    classify_complexity, CacheConfig, CacheHit, CacheValue, ComplexityFlags, ComplexityThresholds,
    ComplexityTier, ModelTier, ModelTierConfig, ModelTiers, ResponseCache, TierMap, TokenEstimates,
};
use crate::metrics::{MetricsSnapshot, UsageMetrics};
use crate::traits::MetricsStore;
use crate::types::{JournalEntry, Persona};

/// Router settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub tiers: ModelTiers,
    pub tier_map: TierMap,
    pub token_estimates: TokenEstimates,
    pub thresholds: ComplexityThresholds,
    pub cache: CacheConfig,
    /// Daily ceiling in USD.
    pub daily_limit: f64,
    /// Monthly ceiling in USD.
    pub monthly_limit: f64,
    /// Fixed cost charged for a cache hit (embedding/pre-check).
    pub cache_hit_cost: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tiers: ModelTiers::default(),
            tier_map: TierMap::default(),
            token_estimates: TokenEstimates::default(),
            thresholds: ComplexityThresholds::default(),
            cache: CacheConfig::default(),
            daily_limit: 5.0,
            monthly_limit: 100.0,
            cache_hit_cost: 0.0001,
        }
    }
}

/// Which ceiling a projection violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CostLimit {
    Daily,
    Monthly,
}

/// Outcome of [`CostRouter::check_cost_limits`].
#[derive(Debug, Clone, PartialEq)]
pub struct CostCheck {
    pub allowed: bool,
    pub violated: Option<CostLimit>,
    pub reason: String,
}

impl CostCheck {
    fn allowed() -> Self {
        Self {
            allowed: true,
            violated: None,
            reason: "within budget".to_string(),
        }
    }

    fn denied(limit: CostLimit, projected: f64, ceiling: f64) -> Self {
        Self {
            allowed: false,
            violated: Some(limit),
            reason: format!(
                "{} limit reached: projected ${:.4} against ${:.2}",
                limit, projected, ceiling
            ),
        }
    }
}

/// Outcome of [`CostRouter::select_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    pub model: ModelTier,
    pub reason: String,
    /// The preferred tier was over budget and a cheaper one was chosen.
    pub downgraded: bool,
}

/// Budget held for one in-flight request.
///
/// Settle it with [`CostRouter::settle`] once the provider answers. Dropping
/// it unsettled (failure, cancellation) releases the hold.
#[must_use = "dropping a reservation releases it"]
pub struct CostReservation {
    metrics: Arc<dyn MetricsStore>,
    amount: f64,
    open: bool,
}

impl CostReservation {
    /// Amount held.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    fn settle(mut self, tokens: u64, cost: f64) {
        self.open = false;
        self.metrics.settle_reservation(self.amount, tokens, cost);
    }
}

impl Drop for CostReservation {
    fn drop(&mut self) {
        if self.open {
            debug!(amount = self.amount, "Releasing unsettled cost reservation");
            self.metrics.release_reservation(self.amount);
        }
    }
}

impl std::fmt::Debug for CostReservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostReservation")
            .field("amount", &self.amount)
            .field("open", &self.open)
            .finish()
    }
}

/// Classifies requests, owns the response cache and enforces cost ceilings.
///
/// All metrics mutation goes through [`CostRouter::track_cost`],
/// [`CostRouter::settle`] and the counters beside them; each is a single
/// store call.
pub struct CostRouter {
    config: RouterConfig,
    cache: ResponseCache,
    metrics: Arc<dyn MetricsStore>,
}

impl CostRouter {
    /// Create a router over the given metrics store.
    pub fn new(config: RouterConfig, metrics: Arc<dyn MetricsStore>) -> Self {
        let cache = ResponseCache::new(config.cache);
        Self {
            config,
            cache,
            metrics,
        }
    }

    /// Router settings.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// The response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Tier config for a model.
    pub fn tier(&self, model: ModelTier) -> &ModelTierConfig {
        self.config.tiers.get(model)
    }

    /// Classify an entry's request complexity.
    pub fn classify(&self, entry: &JournalEntry, flags: ComplexityFlags) -> ComplexityTier {
        classify_complexity(&entry.content, flags, &self.config.thresholds)
    }

    /// Token estimate for a complexity tier.
    pub fn estimated_tokens(&self, complexity: ComplexityTier) -> u32 {
        self.config.token_estimates.for_tier(complexity)
    }

    /// Projected cost of `tokens` on `model`.
    pub fn estimate_cost(&self, model: ModelTier, tokens: u32) -> f64 {
        self.tier(model).cost_for(u64::from(tokens))
    }

    /// Stable key over the content prefix, persona, mood bucket and complexity.
    pub fn cache_key(
        &self,
        entry: &JournalEntry,
        persona: Persona,
        complexity: ComplexityTier,
    ) -> String {
        let prefix: String = entry
            .content
            .chars()
            .take(self.config.cache.key_prefix_chars)
            .collect();
        let material = format!(
            "{}|{}|{}|{}",
            prefix,
            persona,
            entry.mood_bucket(),
            complexity
        );
        format!("{:x}", md5::compute(material.as_bytes()))
    }

    /// Fetch a cached response. A miss is counted here; a hit is billed by
    /// [`CostRouter::track_cost`].
    pub fn get_cached(&self, key: &str) -> Option<CacheHit> {
        let hit = self.cache.get(key);
        if hit.is_none() {
            self.metrics.record_cache_miss();
        }
        hit
    }

    /// Store a generated response.
    pub fn put_cached(&self, key: impl Into<String>, value: CacheValue) {
        if value.response.is_fallback() {
            return;
        }
        self.cache.put(key, value);
    }

    /// Compare running totals plus `estimated_cost` against both ceilings.
    ///
    /// Daily is checked before monthly. Reaching a ceiling exactly is
    /// already over it. Amounts held by in-flight requests count as spent.
    pub fn check_cost_limits(&self, estimated_cost: f64) -> CostCheck {
        let estimated_cost = estimated_cost + self.metrics.reserved_cost();
        let projected_daily = self.metrics.daily_cost() + estimated_cost;
        if projected_daily >= self.config.daily_limit {
            return CostCheck::denied(CostLimit::Daily, projected_daily, self.config.daily_limit);
        }

        let projected_monthly = self.metrics.monthly_cost() + estimated_cost;
        if projected_monthly >= self.config.monthly_limit {
            return CostCheck::denied(
                CostLimit::Monthly,
                projected_monthly,
                self.config.monthly_limit,
            );
        }

        CostCheck::allowed()
    }

    /// Pick a model for the request.
    ///
    /// Tries the preferred tier, steps down once to economy if that is over
    /// budget, and otherwise settles on the fallback tier.
    pub fn select_model(&self, complexity: ComplexityTier, estimated_tokens: u32) -> ModelSelection {
        let preferred = self.config.tier_map.preferred(complexity);
        if preferred == ModelTier::Fallback {
            return ModelSelection {
                model: ModelTier::Fallback,
                reason: format!("{} requests are mapped to the fallback tier", complexity),
                downgraded: false,
            };
        }

        let check = self.check_cost_limits(self.estimate_cost(preferred, estimated_tokens));
        if check.allowed {
            return ModelSelection {
                model: preferred,
                reason: format!("{} request on preferred {} tier", complexity, preferred),
                downgraded: false,
            };
        }

        if preferred == ModelTier::Primary {
            let economy = self.check_cost_limits(self.estimate_cost(ModelTier::Economy, estimated_tokens));
            if economy.allowed {
                debug!(%complexity, reason = %check.reason, "Stepping down to economy tier");
                return ModelSelection {
                    model: ModelTier::Economy,
                    reason: format!("primary over budget ({}), using economy", check.reason),
                    downgraded: true,
                };
            }
            return ModelSelection {
                model: ModelTier::Fallback,
                reason: format!("primary and economy over budget ({})", economy.reason),
                downgraded: true,
            };
        }

        ModelSelection {
            model: ModelTier::Fallback,
            reason: format!("{} over budget ({})", preferred, check.reason),
            downgraded: true,
        }
    }

    /// Hold `estimated_cost` against both ceilings in one atomic step.
    pub fn try_reserve(&self, estimated_cost: f64) -> Result<CostReservation, CostCheck> {
        match self.metrics.try_reserve(
            estimated_cost,
            self.config.daily_limit,
            self.config.monthly_limit,
        ) {
            Ok(()) => Ok(CostReservation {
                metrics: self.metrics.clone(),
                amount: estimated_cost,
                open: true,
            }),
            Err(limit) => {
                let (spent, ceiling) = match limit {
                    CostLimit::Daily => (self.metrics.daily_cost(), self.config.daily_limit),
                    CostLimit::Monthly => (self.metrics.monthly_cost(), self.config.monthly_limit),
                };
                let projected = spent + self.metrics.reserved_cost() + estimated_cost;
                Err(CostCheck::denied(limit, projected, ceiling))
            }
        }
    }

    /// [`CostRouter::select_model`] for a live request: every rung of the
    /// ladder is checked and held atomically, and the chosen tier's cost
    /// stays reserved until settled or dropped.
    pub fn reserve_model(
        &self,
        complexity: ComplexityTier,
        estimated_tokens: u32,
    ) -> (ModelSelection, Option<CostReservation>) {
        let preferred = self.config.tier_map.preferred(complexity);
        if preferred == ModelTier::Fallback {
            let selection = ModelSelection {
                model: ModelTier::Fallback,
                reason: format!("{} requests are mapped to the fallback tier", complexity),
                downgraded: false,
            };
            return (selection, None);
        }

        let denied = match self.try_reserve(self.estimate_cost(preferred, estimated_tokens)) {
            Ok(reservation) => {
                let selection = ModelSelection {
                    model: preferred,
                    reason: format!("{} request on preferred {} tier", complexity, preferred),
                    downgraded: false,
                };
                return (selection, Some(reservation));
            }
            Err(check) => check,
        };

        if preferred == ModelTier::Primary {
            match self.try_reserve(self.estimate_cost(ModelTier::Economy, estimated_tokens)) {
                Ok(reservation) => {
                    debug!(%complexity, reason = %denied.reason, "Stepping down to economy tier");
                    let selection = ModelSelection {
                        model: ModelTier::Economy,
                        reason: format!("primary over budget ({}), using economy", denied.reason),
                        downgraded: true,
                    };
                    return (selection, Some(reservation));
                }
                Err(economy) => {
                    let selection = ModelSelection {
                        model: ModelTier::Fallback,
                        reason: format!("primary and economy over budget ({})", economy.reason),
                        downgraded: true,
                    };
                    return (selection, None);
                }
            }
        }

        let selection = ModelSelection {
            model: ModelTier::Fallback,
            reason: format!("{} over budget ({})", preferred, denied.reason),
            downgraded: true,
        };
        (selection, None)
    }

    /// Bill a reserved request at its real usage, returning the amount charged.
    pub fn settle(&self, reservation: CostReservation, model: ModelTier, tokens_used: u64) -> f64 {
        let cost = self.tier(model).cost_for(tokens_used);
        reservation.settle(tokens_used, cost);
        cost
    }

    /// Record spend for a finished request, returning the amount charged.
    ///
    /// A cache hit is charged the fixed pre-check cost only and counted as
    /// a hit, not a request; the full-rate cost it avoided is recorded as
    /// savings.
    pub fn track_cost(&self, model: ModelTier, tokens_used: u64, was_cached: bool) -> f64 {
        let full_cost = self.tier(model).cost_for(tokens_used);
        if was_cached {
            let cost = self.config.cache_hit_cost;
            self.metrics
                .record_cache_hit(cost, (full_cost - cost).max(0.0));
            cost
        } else {
            self.metrics.record_request(tokens_used, full_cost);
            full_cost
        }
    }

    /// Count a request answered with the emergency fallback.
    pub fn record_fallback(&self) {
        self.metrics.record_fallback();
    }

    /// Budget held by in-flight requests.
    pub fn reserved_cost(&self) -> f64 {
        self.metrics.reserved_cost()
    }

    /// Current daily bucket.
    pub fn usage(&self) -> UsageMetrics {
        self.metrics.snapshot()
    }

    /// Read-only metrics for the host application.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let mut usage = self.metrics.snapshot();
        usage.daily_limit = self.config.daily_limit;
        usage.monthly_limit = self.config.monthly_limit;
        MetricsSnapshot::from_usage(&usage, self.metrics.monthly_cost())
    }

    /// Snapshot and clear the daily bucket.
    pub fn reset_daily(&self) -> UsageMetrics {
        let previous = self.metrics.reset_daily();
        info!(
            requests = previous.total_requests,
            cost = previous.total_cost,
            cache_hits = previous.cache_hits,
            "Daily usage reset"
        );
        previous
    }

    /// Clear the monthly total.
    pub fn reset_monthly(&self) -> f64 {
        let previous = self.metrics.reset_monthly();
        info!(cost = previous, "Monthly usage reset");
        previous
    }
}

impl std::fmt::Debug for CostRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostRouter")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetricsStore;

    fn router() -> (CostRouter, Arc<InMemoryMetricsStore>) {
        let metrics = Arc::new(InMemoryMetricsStore::new(5.0, 100.0));
        let router = CostRouter::new(RouterConfig::default(), metrics.clone());
        (router, metrics)
    }

    #[test]
    fn test_cost_limit_boundary() {
        let (router, metrics) = router();
        metrics.record_request(0, 4.0);

        assert!(router.check_cost_limits(0.99).allowed);
        let at_limit = router.check_cost_limits(1.0);
        assert!(!at_limit.allowed);
        assert_eq!(at_limit.violated, Some(CostLimit::Daily));
    }

    #[test]
    fn test_daily_checked_before_monthly() {
        let metrics = Arc::new(InMemoryMetricsStore::new(5.0, 100.0));
        let router = CostRouter::new(
            RouterConfig {
                monthly_limit: 1.0,
                ..Default::default()
            },
            metrics.clone(),
        );
        metrics.record_request(0, 4.5);

        let check = router.check_cost_limits(1.0);
        assert_eq!(check.violated, Some(CostLimit::Daily));

        metrics.reset_daily();
        let check = router.check_cost_limits(0.1);
        assert_eq!(check.violated, Some(CostLimit::Monthly));
        assert!(check.reason.contains("monthly"));
    }

    #[test]
    fn test_select_model_prefers_mapping() {
        let (router, _) = router();
        assert_eq!(router.select_model(ComplexityTier::Simple, 300).model, ModelTier::Economy);
        let selection = router.select_model(ComplexityTier::Complex, 1000);
        assert_eq!(selection.model, ModelTier::Primary);
        assert!(!selection.downgraded);
    }

    #[test]
    fn test_select_model_steps_down_once() {
        let (router, metrics) = router();
        // Primary: 1000 tokens = $0.015; economy = $0.002.
        metrics.record_request(0, 4.99);

        let selection = router.select_model(ComplexityTier::Complex, 1000);
        assert_eq!(selection.model, ModelTier::Economy);
        assert!(selection.downgraded);

        metrics.record_request(0, 0.009);
        let selection = router.select_model(ComplexityTier::Complex, 1000);
        assert_eq!(selection.model, ModelTier::Fallback);
    }

    #[test]
    fn test_selected_tier_always_passes_its_limit_check() {
        let (router, metrics) = router();
        for step in 0..60 {
            for complexity in [
                ComplexityTier::Simple,
                ComplexityTier::Moderate,
                ComplexityTier::Complex,
            ] {
                let tokens = router.estimated_tokens(complexity);
                let selection = router.select_model(complexity, tokens);
                if selection.model != ModelTier::Fallback {
                    let cost = router.estimate_cost(selection.model, tokens);
                    assert!(router.check_cost_limits(cost).allowed, "step {step}");
                }
            }
            metrics.record_request(0, 0.0999);
        }
    }

    #[test]
    fn test_reserve_model_holds_and_settles() {
        let (router, metrics) = router();
        let (selection, reservation) = router.reserve_model(ComplexityTier::Complex, 1000);
        assert_eq!(selection.model, ModelTier::Primary);
        let reservation = reservation.unwrap();
        assert!((reservation.amount() - 0.015).abs() < 1e-12);
        assert!((metrics.reserved_cost() - 0.015).abs() < 1e-12);

        let charged = router.settle(reservation, ModelTier::Primary, 2000);
        assert!((charged - 0.03).abs() < 1e-12);
        assert_eq!(metrics.reserved_cost(), 0.0);
        assert_eq!(metrics.snapshot().total_requests, 1);
        assert!((metrics.daily_cost() - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_dropped_reservation_is_released() {
        let (router, metrics) = router();
        {
            let (_, reservation) = router.reserve_model(ComplexityTier::Simple, 300);
            assert!(reservation.is_some());
            assert!(metrics.reserved_cost() > 0.0);
        }
        assert_eq!(metrics.reserved_cost(), 0.0);
        assert_eq!(metrics.snapshot().total_requests, 0);
    }

    #[test]
    fn test_reservations_steer_the_ladder() {
        let (router, metrics) = router();
        metrics.record_request(0, 4.982);

        // Primary $0.015 fits once, economy $0.002 once more, then nothing.
        let (first, held_primary) = router.reserve_model(ComplexityTier::Complex, 1000);
        assert_eq!(first.model, ModelTier::Primary);
        let (second, held_economy) = router.reserve_model(ComplexityTier::Complex, 1000);
        assert_eq!(second.model, ModelTier::Economy);
        assert!(second.downgraded);
        let (third, none) = router.reserve_model(ComplexityTier::Complex, 1000);
        assert_eq!(third.model, ModelTier::Fallback);
        assert!(none.is_none());

        assert!(!router.check_cost_limits(0.002).allowed);
        drop(held_primary);
        drop(held_economy);
        assert!(router.check_cost_limits(0.002).allowed);
    }

    #[test]
    fn test_track_cost_billed_and_cached() {
        let (router, metrics) = router();
        let charged = router.track_cost(ModelTier::Primary, 2000, false);
        assert!((charged - 0.03).abs() < 1e-12);

        let charged = router.track_cost(ModelTier::Primary, 2000, true);
        assert!((charged - 0.0001).abs() < 1e-12);

        let usage = metrics.snapshot();
        assert_eq!(usage.total_requests, 1);
        assert_eq!(usage.cache_hits, 1);
        assert_eq!(usage.tokens_used, 2000);
        assert!((usage.cost_savings - 0.0299).abs() < 1e-9);
        assert!((usage.total_cost - 0.0301).abs() < 1e-9);
    }

    #[test]
    fn test_cache_key_stable_and_sensitive() {
        let (router, _) = router();
        let entry = JournalEntry::new("e1", "u1", "Long day at the office").with_levels(6.2, 5.0, 4.0);
        let same = JournalEntry::new("e2", "u2", "Long day at the office").with_levels(5.8, 3.0, 9.0);

        let key = router.cache_key(&entry, Persona::Pulse, ComplexityTier::Simple);
        assert_eq!(key, router.cache_key(&same, Persona::Pulse, ComplexityTier::Simple));
        assert_ne!(key, router.cache_key(&entry, Persona::Sage, ComplexityTier::Simple));
        assert_ne!(key, router.cache_key(&entry, Persona::Pulse, ComplexityTier::Moderate));
        assert_eq!(key.len(), 32);

        let sadder = entry.clone().with_levels(3.0, 5.0, 4.0);
        assert_ne!(key, router.cache_key(&sadder, Persona::Pulse, ComplexityTier::Simple));
    }

    #[test]
    fn test_cache_key_uses_prefix_only() {
        let (router, _) = router();
        let base = "a".repeat(200);
        let one = JournalEntry::new("e1", "u1", format!("{base} first ending"));
        let two = JournalEntry::new("e2", "u1", format!("{base} second ending"));
        assert_eq!(
            router.cache_key(&one, Persona::Pulse, ComplexityTier::Complex),
            router.cache_key(&two, Persona::Pulse, ComplexityTier::Complex)
        );
    }

    #[test]
    fn test_fallback_results_are_not_cached() {
        let (router, _) = router();
        let response = crate::safety::emergency_fallback(crate::types::FallbackReason::Timeout, 5);
        router.put_cached(
            "k",
            CacheValue {
                response,
                model_used: ModelTier::Fallback,
                complexity: ComplexityTier::Simple,
                tokens_used: 0,
            },
        );
        assert!(router.cache().is_empty());
    }

    #[test]
    fn test_snapshot_reports_remaining() {
        let (router, _) = router();
        router.track_cost(ModelTier::Primary, 100_000, false);
        router.record_fallback();
        assert!(router.get_cached("missing").is_none());

        let snapshot = router.metrics_snapshot();
        assert!((snapshot.daily_remaining - 3.5).abs() < 1e-9);
        assert!((snapshot.monthly_remaining - 98.5).abs() < 1e-9);
        assert!((snapshot.fallback_rate - 0.5).abs() < 1e-9);
        assert_eq!(snapshot.cache_hit_rate, 0.0);
    }
}
