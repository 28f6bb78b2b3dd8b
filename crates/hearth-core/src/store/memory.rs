//! In-memory [`JournalStore`] for tests and embedding without a database.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::HearthResult;
use crate::traits::JournalStore;
use crate::types::{
    AiInsight, EngagementReason, ExistingResponse, JournalEntry, UserPreferences,
};

#[derive(Debug, Default)]
struct Tables {
    entries: HashMap<String, JournalEntry>,
    responses: Vec<ExistingResponse>,
    preferences: HashMap<String, UserPreferences>,
    insights: Vec<AiInsight>,
}

/// Journal storage held in process memory.
///
/// Saving an insight also records it as an existing response, so a
/// proactive comment that was just executed is visible to the next scan.
#[derive(Debug, Default)]
pub struct InMemoryJournalStore {
    tables: RwLock<Tables>,
}

impl InMemoryJournalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| {
            warn!("Journal store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|poisoned| {
            warn!("Journal store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Insert or replace an entry.
    pub fn add_entry(&self, entry: JournalEntry) {
        self.write().entries.insert(entry.id.clone(), entry);
    }

    /// Record a response already attached to an entry.
    pub fn add_response(&self, response: ExistingResponse) {
        self.write().responses.push(response);
    }

    /// Insert or replace a user's preferences.
    pub fn set_preferences(&self, prefs: UserPreferences) {
        self.write().preferences.insert(prefs.user_id.clone(), prefs);
    }

    /// Every insight saved so far, oldest first.
    pub fn insights(&self) -> Vec<AiInsight> {
        self.read().insights.clone()
    }

    /// Insights saved against one entry.
    pub fn insights_for(&self, entry_id: &str) -> Vec<AiInsight> {
        self.read()
            .insights
            .iter()
            .filter(|i| i.entry_id == entry_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn get_entry(&self, entry_id: &str) -> HearthResult<Option<JournalEntry>> {
        Ok(self.read().entries.get(entry_id).cloned())
    }

    async fn get_recent_entries(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> HearthResult<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .read()
            .entries
            .values()
            .filter(|e| e.user_id == user_id && e.created_at >= since)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn get_existing_responses(
        &self,
        entry_ids: &[String],
    ) -> HearthResult<Vec<ExistingResponse>> {
        Ok(self
            .read()
            .responses
            .iter()
            .filter(|r| entry_ids.contains(&r.entry_id))
            .cloned()
            .collect())
    }

    async fn get_user_preferences(&self, user_id: &str) -> HearthResult<UserPreferences> {
        Ok(self
            .read()
            .preferences
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserPreferences::new(user_id)))
    }

    async fn save_insight(&self, insight: &AiInsight) -> HearthResult<()> {
        let reason = insight
            .topic_flags
            .get("reason")
            .and_then(|v| v.as_str())
            .and_then(|s| EngagementReason::from_str(s).ok());

        let mut response = ExistingResponse::new(insight.entry_id.clone(), insight.persona)
            .with_created_at(insight.created_at);
        response.id = insight.id.clone();
        response.reason = reason;

        let mut tables = self.write();
        tables.responses.push(response);
        tables.insights.push(insight.clone());
        debug!(
            entry_id = %insight.entry_id,
            persona = %insight.persona,
            reason = ?reason,
            "Insight saved"
        );
        Ok(())
    }

    async fn active_user_ids(&self, since: DateTime<Utc>) -> HearthResult<Vec<String>> {
        let mut users: Vec<String> = self
            .read()
            .entries
            .values()
            .filter(|e| e.created_at >= since)
            .map(|e| e.user_id.clone())
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }
}
