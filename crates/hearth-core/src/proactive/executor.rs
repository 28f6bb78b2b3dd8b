//! Scan and execute proactive opportunities against the journal store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::config::ProactiveConfig;
use super::detector::find_opportunities;
use crate::engine::{FollowUpContext, GenerationEngine, GenerationRequest};
use crate::error::{HearthError, HearthResult};
use crate::traits::JournalStore;
use crate::types::{AiInsight, EngagementOpportunity, EngagementReason, FallbackReason};

/// Result of executing one opportunity.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// A follow-up was generated and saved.
    Executed(AiInsight),
    /// The entry already has a response from this persona for this reason.
    AlreadySatisfied,
    /// Generation ended on the fallback; nothing was saved and the
    /// opportunity stays open for a later cycle.
    Deferred(FallbackReason),
}

/// Per-user result of one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserCycle {
    pub found: usize,
    pub executed: usize,
    pub skipped: usize,
    pub deferred: usize,
    pub failed: usize,
}

/// Totals for one scheduler cycle across all active users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub users: usize,
    /// Users whose scan failed outright.
    pub failed_users: usize,
    pub found: usize,
    pub executed: usize,
    pub skipped: usize,
    pub deferred: usize,
    pub failed: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CycleReport {
    fn absorb(&mut self, cycle: &UserCycle) {
        self.found += cycle.found;
        self.executed += cycle.executed;
        self.skipped += cycle.skipped;
        self.deferred += cycle.deferred;
        self.failed += cycle.failed;
    }

    /// Cycle duration in milliseconds, once completed.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Finds delayed follow-up opportunities and turns them into saved insights.
pub struct ProactiveScheduler {
    store: Arc<dyn JournalStore>,
    engine: Arc<GenerationEngine>,
    config: ProactiveConfig,
}

impl ProactiveScheduler {
    /// Create a scheduler.
    pub fn new(
        store: Arc<dyn JournalStore>,
        engine: Arc<GenerationEngine>,
        config: ProactiveConfig,
    ) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    /// Scan settings.
    pub fn config(&self) -> &ProactiveConfig {
        &self.config
    }

    /// Engine used for execution.
    pub fn engine(&self) -> &Arc<GenerationEngine> {
        &self.engine
    }

    /// Opportunities for one user, highest priority first.
    pub async fn scan_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> HearthResult<Vec<EngagementOpportunity>> {
        let since = now - Duration::days(self.config.lookback_days);
        let entries = self.store.get_recent_entries(user_id, since).await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let entry_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let responses = self.store.get_existing_responses(&entry_ids).await?;
        let prefs = self.store.get_user_preferences(user_id).await?;
        let available = self.engine.selector().available_personas(prefs.tier);

        let opportunities = find_opportunities(&entries, &responses, &available, &self.config, now);
        debug!(
            user_id,
            entries = entries.len(),
            found = opportunities.len(),
            "Scanned user"
        );
        Ok(opportunities)
    }

    /// Generate and save the follow-up for one opportunity.
    ///
    /// Idempotent on the opportunity key: a second call for the same
    /// entry, persona and reason is a no-op.
    pub async fn execute(
        &self,
        opportunity: &EngagementOpportunity,
        now: DateTime<Utc>,
    ) -> HearthResult<ExecutionOutcome> {
        let entry = self
            .store
            .get_entry(&opportunity.entry_id)
            .await?
            .ok_or_else(|| HearthError::entry_not_found(opportunity.entry_id.clone()))?;

        let existing = self
            .store
            .get_existing_responses(std::slice::from_ref(&opportunity.entry_id))
            .await?;
        if existing
            .iter()
            .any(|r| r.persona == opportunity.persona && r.reason == Some(opportunity.reason))
        {
            debug!(key = %opportunity.key(), "Opportunity already satisfied");
            return Ok(ExecutionOutcome::AlreadySatisfied);
        }

        let follow_up = FollowUpContext::new(
            opportunity.reason,
            opportunity.context.clone(),
            entry.hours_since(now),
        );
        let mut request =
            GenerationRequest::new(entry.clone(), opportunity.persona).with_follow_up(follow_up);
        if opportunity.reason == EngagementReason::PatternFollowup {
            request = request.with_pattern_analysis();
        }

        let outcome = self.engine.generate(request).await;
        if let Some(reason) = outcome.response.fallback_reason {
            info!(key = %opportunity.key(), %reason, "Follow-up deferred");
            return Ok(ExecutionOutcome::Deferred(reason));
        }

        let insight = outcome.to_insight(&entry, Some((opportunity.reason, opportunity.priority)));
        self.store.save_insight(&insight).await?;
        info!(
            key = %opportunity.key(),
            priority = opportunity.priority,
            cached = outcome.cached,
            "Follow-up saved"
        );
        Ok(ExecutionOutcome::Executed(insight))
    }

    /// Scan one user and execute what was found.
    ///
    /// A failed execution is logged and counted; the rest still run.
    pub async fn run_user(&self, user_id: &str, now: DateTime<Utc>) -> HearthResult<UserCycle> {
        let opportunities = self.scan_user(user_id, now).await?;
        let mut cycle = UserCycle {
            found: opportunities.len(),
            ..Default::default()
        };

        for opportunity in &opportunities {
            match self.execute(opportunity, now).await {
                Ok(ExecutionOutcome::Executed(_)) => cycle.executed += 1,
                Ok(ExecutionOutcome::AlreadySatisfied) => cycle.skipped += 1,
                Ok(ExecutionOutcome::Deferred(_)) => cycle.deferred += 1,
                Err(e) => {
                    error!(key = %opportunity.key(), error = %e, "Follow-up execution failed");
                    cycle.failed += 1;
                }
            }
        }
        Ok(cycle)
    }

    /// One full cycle over every user active within the lookback window.
    ///
    /// Users run concurrently, bounded by `max_concurrent_users`. Only a
    /// failure to list users fails the cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> HearthResult<CycleReport> {
        let mut report = CycleReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let since = now - Duration::days(self.config.lookback_days);
        let users = self.store.active_user_ids(since).await?;
        report.users = users.len();

        let results: Vec<(String, HearthResult<UserCycle>)> = stream::iter(users)
            .map(|user_id| async move {
                let result = self.run_user(&user_id, now).await;
                (user_id, result)
            })
            .buffer_unordered(self.config.max_concurrent_users.max(1))
            .collect()
            .await;

        for (user_id, result) in results {
            match result {
                Ok(cycle) => report.absorb(&cycle),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Proactive scan failed");
                    report.failed_users += 1;
                }
            }
        }

        report.completed_at = Some(Utc::now());
        info!(
            users = report.users,
            found = report.found,
            executed = report.executed,
            deferred = report.deferred,
            failed = report.failed + report.failed_users,
            "Proactive cycle complete"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for ProactiveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProactiveScheduler")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetricsStore;
    use crate::routing::{CostRouter, RouterConfig};
    use crate::safety::{SafetyConfig, SafetyValidator};
    use crate::store::InMemoryJournalStore;
    use crate::traits::{LlmResponse, MockLlm};
    use crate::types::{JournalEntry, Persona};

    const REPLY: &str = "Checking back in after a heavy day. How are you carrying it this morning?";

    fn scheduler(llm: MockLlm, store: Arc<InMemoryJournalStore>) -> ProactiveScheduler {
        let metrics = Arc::new(InMemoryMetricsStore::default());
        let router = Arc::new(CostRouter::new(RouterConfig::default(), metrics));
        let validator = SafetyValidator::new(&SafetyConfig::default()).unwrap();
        let engine = GenerationEngine::new(Arc::new(llm), router, validator)
            .with_retry(crate::engine::RetryPolicy::none());
        ProactiveScheduler::new(store, Arc::new(engine), ProactiveConfig::default())
    }

    fn stressed_entry(now: DateTime<Utc>) -> JournalEntry {
        JournalEntry::new("e1", "u1", "Too many things at once today.")
            .with_levels(6.0, 5.0, 9.0)
            .with_created_at(now - Duration::hours(3))
    }

    #[tokio::test]
    async fn test_execute_saves_and_is_idempotent() {
        let now = Utc::now();
        let store = Arc::new(InMemoryJournalStore::new());
        store.add_entry(stressed_entry(now));

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .withf(|req| req.system_prompt.contains("delayed follow-up"))
            .times(1)
            .returning(|_| Ok(LlmResponse::text(REPLY)));
        let scheduler = scheduler(llm, store.clone());

        let found = scheduler.scan_user("u1", now).await.unwrap();
        assert_eq!(found.len(), 1);
        let opportunity = &found[0];
        assert_eq!(opportunity.reason, EngagementReason::HighStressCheckin);

        let insight = match scheduler.execute(opportunity, now).await.unwrap() {
            ExecutionOutcome::Executed(insight) => insight,
            other => panic!("expected execution, got {other:?}"),
        };
        // Anchor is premium-only; free users get Pulse.
        assert_eq!(insight.persona, Persona::Pulse);
        assert_eq!(insight.topic_flags["reason"], "high_stress_checkin");
        assert_eq!(insight.topic_flags["proactive"], true);

        let second = scheduler.execute(opportunity, now).await.unwrap();
        assert_eq!(second, ExecutionOutcome::AlreadySatisfied);
        assert_eq!(store.insights().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_is_deferred_not_saved() {
        let now = Utc::now();
        let store = Arc::new(InMemoryJournalStore::new());
        store.add_entry(stressed_entry(now));

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .returning(|_| Err(HearthError::authentication("bad key")));
        let scheduler = scheduler(llm, store.clone());

        let found = scheduler.scan_user("u1", now).await.unwrap();
        let outcome = scheduler.execute(&found[0], now).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Deferred(FallbackReason::ProviderUnavailable));
        assert!(store.insights().is_empty());
    }

    #[tokio::test]
    async fn test_missing_entry_is_an_error() {
        let store = Arc::new(InMemoryJournalStore::new());
        let scheduler = scheduler(MockLlm::new(), store);
        let opportunity = EngagementOpportunity {
            entry_id: "gone".to_string(),
            user_id: "u1".to_string(),
            persona: Persona::Pulse,
            reason: EngagementReason::LowMoodCheckin,
            priority: 8,
            delay_hours: 0.75,
            context: String::new(),
        };
        let err = scheduler.execute(&opportunity, Utc::now()).await.unwrap_err();
        assert!(matches!(err, HearthError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cycle_runs_every_active_user() {
        let now = Utc::now();
        let store = Arc::new(InMemoryJournalStore::new());
        store.add_entry(stressed_entry(now));
        store.add_entry(
            JournalEntry::new("e2", "u2", "Sad and flat all day.")
                .with_levels(2.0, 5.0, 5.0)
                .with_created_at(now - Duration::hours(5)),
        );
        store.add_entry(
            JournalEntry::new("e3", "u3", "Lovely walk by the river.")
                .with_created_at(now - Duration::hours(5)),
        );

        let mut llm = MockLlm::new();
        llm.expect_complete()
            .times(2)
            .returning(|_| Ok(LlmResponse::text(REPLY)));
        let scheduler = scheduler(llm, store.clone());

        let report = scheduler.run_cycle(now).await.unwrap();
        assert_eq!(report.users, 3);
        assert_eq!(report.found, 2);
        assert_eq!(report.executed, 2);
        assert_eq!(report.failed_users, 0);
        assert!(report.duration_ms().is_some());

        // Satisfied check-ins are not found again; only a second voice is left.
        for user in ["u1", "u2"] {
            let again = scheduler.scan_user(user, now).await.unwrap();
            assert_eq!(again.len(), 1);
            assert_eq!(again[0].reason, EngagementReason::SecondPerspective);
            assert_eq!(again[0].persona, Persona::Sage);
        }
        assert_eq!(store.insights().len(), 2);
    }
}
