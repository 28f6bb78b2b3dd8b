//! Injectable usage-metrics store.

use crate::metrics::UsageMetrics;
use crate::routing::CostLimit;

/// Process-wide usage accounting.
///
/// Each method is one atomic step: a concurrent caller never observes a
/// half-applied update, and a cancelled request never leaves one behind.
pub trait MetricsStore: Send + Sync {
    /// A billed completion: one request, `tokens` used, `cost` spent.
    fn record_request(&self, tokens: u64, cost: f64);

    /// A cache hit: small fixed `cost`, `saved` avoided spend.
    fn record_cache_hit(&self, cost: f64, saved: f64);

    /// A cache lookup that found nothing usable.
    fn record_cache_miss(&self);

    /// A request answered with the emergency fallback.
    fn record_fallback(&self);

    /// Check `cost` against both ceilings and hold it if it fits.
    ///
    /// The check and the hold are one step, so concurrent callers cannot
    /// all pass against the same total. Held amounts count toward both
    /// ceilings until settled or released. Daily is checked first.
    fn try_reserve(&self, cost: f64, daily_limit: f64, monthly_limit: f64) -> Result<(), CostLimit>;

    /// Drop a hold of `reserved` and bill the request it covered.
    fn settle_reservation(&self, reserved: f64, tokens: u64, cost: f64);

    /// Drop a hold of `reserved` without billing anything.
    fn release_reservation(&self, reserved: f64);

    /// Total currently held by in-flight requests.
    fn reserved_cost(&self) -> f64;

    /// Spend in the current daily bucket.
    fn daily_cost(&self) -> f64;

    /// Spend in the current monthly bucket.
    fn monthly_cost(&self) -> f64;

    /// Copy of the daily bucket.
    fn snapshot(&self) -> UsageMetrics;

    /// Snapshot the daily bucket, then clear it. The monthly total is kept.
    fn reset_daily(&self) -> UsageMetrics;

    /// Clear the monthly total, returning what it was.
    fn reset_monthly(&self) -> f64;
}
