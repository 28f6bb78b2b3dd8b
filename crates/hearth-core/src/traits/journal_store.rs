//! Collaborator interface onto journal storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::HearthResult;
use crate::types::{AiInsight, ExistingResponse, JournalEntry, UserPreferences};

/// Everything the core reads from, and writes back to, the host application.
///
/// Persistence mechanics live behind this trait; hearth never owns storage.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Fetch a single entry.
    async fn get_entry(&self, entry_id: &str) -> HearthResult<Option<JournalEntry>>;

    /// Entries for a user created at or after `since`, newest first.
    async fn get_recent_entries(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> HearthResult<Vec<JournalEntry>>;

    /// AI responses already stored against any of the given entries.
    async fn get_existing_responses(
        &self,
        entry_ids: &[String],
    ) -> HearthResult<Vec<ExistingResponse>>;

    /// Preference/tier record for a user.
    async fn get_user_preferences(&self, user_id: &str) -> HearthResult<UserPreferences>;

    /// Persist a generated insight.
    async fn save_insight(&self, insight: &AiInsight) -> HearthResult<()>;

    /// Users with at least one entry since `since`.
    async fn active_user_ids(&self, since: DateTime<Utc>) -> HearthResult<Vec<String>>;
}
