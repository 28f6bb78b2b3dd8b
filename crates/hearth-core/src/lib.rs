//! hearth-core - Core library for hearth.
//!
//! This crate provides the types, traits and engines behind hearth's
//! journaling companion: cost-aware model routing with a response cache,
//! safety validation, persona selection and proactive follow-ups.
//!
//! # Example
//!
//! ```ignore
//! use hearth_core::{GenerationRequest, HearthConfig, JournalEntry, Persona};
//! use std::sync::Arc;
//!
//! let config = HearthConfig::from_env();
//! let metrics = Arc::new(config.metrics_store());
//! let engine = config.build_engine(llm, metrics)?;
//!
//! let entry = JournalEntry::new("e1", "user1", "Long day, but the walk home helped.");
//! let outcome = engine.generate(GenerationRequest::new(entry, Persona::Pulse)).await;
//! println!("{}", outcome.response.message);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod persona;
pub mod proactive;
pub mod routing;
pub mod runtime;
pub mod safety;
pub mod store;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{HearthConfig, LlmProvider, LlmProviderConfig};
pub use engine::{GenerationEngine, GenerationOutcome, GenerationRequest, RetryPolicy};
pub use error::{ErrorCode, HearthError, HearthResult};
pub use metrics::{InMemoryMetricsStore, MetricsSnapshot, UsageMetrics};
pub use persona::{PersonaConfig, PersonaSelector};
pub use proactive::{
    CycleReport, EngagementScheduler, ExecutionOutcome, ProactiveConfig, ProactiveScheduler,
};
pub use routing::{ComplexityTier, CostRouter, ModelTier, RouterConfig};
pub use runtime::{BackgroundRuntime, MetricsResetJob, RuntimeConfig};
pub use safety::{ResponseFormatter, SafetyConfig, SafetyValidator};
pub use store::InMemoryJournalStore;
pub use traits::{
    CompletionRequest, JournalStore, Llm, LlmConfig, LlmResponse, MetricsStore, TokenUsage,
};
pub use types::{
    AiInsight, CommentAuthor, EngagementOpportunity, EngagementReason, ExistingResponse,
    FallbackReason, InteractionLevel, JournalEntry, Persona, ResponseResult, SubscriptionTier,
    UserComment, UserPreferences,
};
