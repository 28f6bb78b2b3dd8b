//! Core traits for hearth collaborators and providers.

mod journal_store;
mod llm;
mod metrics_store;

pub use journal_store::*;
pub use llm::*;
pub use metrics_store::*;
