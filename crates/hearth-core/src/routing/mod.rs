//! Cost-aware routing.
//!
//! Classifies each request into a [`ComplexityTier`], checks the
//! [`ResponseCache`], enforces daily and monthly cost ceilings and picks a
//! [`ModelTier`] with at most one step down before falling back.

mod cache;
mod complexity;
mod model;
mod router;

pub use cache::{CacheConfig, CacheHit, CacheStats, CacheValue, ResponseCache};
pub use complexity::{classify_complexity, ComplexityFlags, ComplexityThresholds};
pub use model::{ComplexityTier, ModelTier, ModelTierConfig, ModelTiers, TierMap, TokenEstimates};
pub use router::{
    CostCheck, CostLimit, CostReservation, CostRouter, ModelSelection, RouterConfig,
};
