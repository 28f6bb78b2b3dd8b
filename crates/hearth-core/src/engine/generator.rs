//! Per-request generation state machine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::Retryable;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use super::prompts::{entry_content, system_prompt};
use super::{FollowUpContext, RetryPolicy, WellnessSignals};
use crate::error::{HearthError, HearthResult};
use crate::persona::PersonaSelector;
use crate::routing::{CacheValue, ComplexityFlags, ComplexityTier, CostRouter, ModelTier};
use crate::safety::{emergency_fallback, ResponseFormatter, SafetyIssue, SafetyValidator};
use crate::traits::{CompletionRequest, Llm, LlmResponse};
use crate::types::{
    AiInsight, EngagementReason, ExistingResponse, FallbackReason, JournalEntry, Persona,
    ResponseResult, UserComment, UserPreferences,
};

/// One persona response to generate.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub entry: JournalEntry,
    pub persona: Persona,
    pub flags: ComplexityFlags,
    /// Set for delayed, proactive comments.
    pub follow_up: Option<FollowUpContext>,
    /// A user comment being replied to.
    pub comment: Option<String>,
}

impl GenerationRequest {
    /// Plain response to an entry.
    pub fn new(entry: JournalEntry, persona: Persona) -> Self {
        Self {
            entry,
            persona,
            flags: ComplexityFlags::default(),
            follow_up: None,
            comment: None,
        }
    }

    /// Ask for cross-entry pattern analysis.
    pub fn with_pattern_analysis(mut self) -> Self {
        self.flags.pattern_analysis = true;
        self
    }

    /// Mark the persona as pinned by the caller.
    pub fn forced(mut self) -> Self {
        self.flags.forced_persona = true;
        self
    }

    /// Frame the response as a delayed follow-up.
    pub fn with_follow_up(mut self, follow_up: FollowUpContext) -> Self {
        self.follow_up = Some(follow_up);
        self
    }

    /// Reply to a user comment under the entry.
    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }

    /// Follow-ups and comment replies are never served from or written to cache.
    fn cacheable(&self) -> bool {
        self.follow_up.is_none() && self.comment.is_none()
    }
}

/// A finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub persona: Persona,
    pub response: ResponseResult,
    pub complexity: ComplexityTier,
    pub model: ModelTier,
    pub cached: bool,
    pub tokens_used: u64,
    /// Amount charged for this request.
    pub cost: f64,
    /// Provider calls made, retries included.
    pub attempts: u32,
    pub signals: WellnessSignals,
}

impl GenerationOutcome {
    /// Flags persisted alongside the insight.
    pub fn topic_flags(&self, engagement: Option<(EngagementReason, u8)>) -> serde_json::Value {
        json!({
            "reason": engagement.map(|(reason, _)| reason.to_string()),
            "priority": engagement.map(|(_, priority)| priority),
            "proactive": engagement.is_some(),
            "wellness_score": self.signals.wellness_score,
            "burnout_risk": self.signals.burnout_risk.to_string(),
            "fallback_reason": self.response.fallback_reason.map(|r| r.to_string()),
            "model": self.model.to_string(),
            "cached": self.cached,
        })
    }

    /// Insight row for the collaborator store.
    pub fn to_insight(
        &self,
        entry: &JournalEntry,
        engagement: Option<(EngagementReason, u8)>,
    ) -> AiInsight {
        AiInsight::from_response(
            entry.id.clone(),
            entry.user_id.clone(),
            self.persona,
            &self.response,
            self.topic_flags(engagement),
        )
    }
}

struct Draft {
    persona: Persona,
    complexity: ComplexityTier,
    signals: WellnessSignals,
    started: Instant,
}

impl Draft {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn finish(self, response: ResponseResult, model: ModelTier) -> GenerationOutcome {
        GenerationOutcome {
            persona: self.persona,
            response,
            complexity: self.complexity,
            model,
            cached: false,
            tokens_used: 0,
            cost: 0.0,
            attempts: 0,
            signals: self.signals,
        }
    }

    fn fallback(self, router: &CostRouter, reason: FallbackReason) -> GenerationOutcome {
        router.record_fallback();
        let response = emergency_fallback(reason, self.elapsed_ms());
        self.finish(response, ModelTier::Fallback)
    }
}

/// Drives one request through classify, cache lookup, limit check, model
/// selection, generation, safety check and cache store.
///
/// [`GenerationEngine::generate`] never fails: every path ends in a
/// [`ResponseResult`], the emergency fallback included.
pub struct GenerationEngine {
    llm: Arc<dyn Llm>,
    router: Arc<CostRouter>,
    validator: SafetyValidator,
    formatter: ResponseFormatter,
    selector: PersonaSelector,
    retry: RetryPolicy,
    provider_timeout: Duration,
    temperature: Option<f32>,
}

impl GenerationEngine {
    /// Create an engine with default formatter, selector and retry policy.
    pub fn new(llm: Arc<dyn Llm>, router: Arc<CostRouter>, validator: SafetyValidator) -> Self {
        Self {
            llm,
            router,
            validator,
            formatter: ResponseFormatter::default(),
            selector: PersonaSelector::new(Default::default()),
            retry: RetryPolicy::default(),
            provider_timeout: Duration::from_secs(30),
            temperature: None,
        }
    }

    /// Builder: set the formatter.
    pub fn with_formatter(mut self, formatter: ResponseFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Builder: set the persona selector.
    pub fn with_selector(mut self, selector: PersonaSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Builder: set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: set the per-call provider timeout.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Builder: set the sampling temperature sent with each call.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// The router (metrics, cache).
    pub fn router(&self) -> &Arc<CostRouter> {
        &self.router
    }

    /// The persona selector.
    pub fn selector(&self) -> &PersonaSelector {
        &self.selector
    }

    /// Generate one persona response.
    pub async fn generate(&self, request: GenerationRequest) -> GenerationOutcome {
        let draft = Draft {
            persona: request.persona,
            complexity: self.router.classify(&request.entry, request.flags),
            signals: WellnessSignals::from_entry(&request.entry),
            started: Instant::now(),
        };
        let entry_id = request.entry.id.as_str();
        let complexity = draft.complexity;

        // CACHE_LOOKUP
        let cache_key = request
            .cacheable()
            .then(|| self.router.cache_key(&request.entry, request.persona, complexity));
        if let Some(key) = &cache_key {
            if let Some(hit) = self.router.get_cached(key) {
                let cost = self.router.track_cost(hit.model_used, hit.tokens_used, true);
                debug!(entry_id, persona = %request.persona, usage = hit.usage_count, "Served from cache");
                return GenerationOutcome {
                    cached: true,
                    cost,
                    ..draft.finish(hit.response, hit.model_used)
                };
            }
        }

        // LIMIT_CHECK: if even the cheapest billable tier is over budget, stop here.
        let estimated_tokens = self.router.estimated_tokens(complexity);
        let floor_cost = self.router.estimate_cost(ModelTier::Economy, estimated_tokens);
        let check = self.router.check_cost_limits(floor_cost);
        if !check.allowed {
            info!(entry_id, reason = %check.reason, "Budget exhausted, serving fallback");
            return draft.fallback(&self.router, FallbackReason::BudgetExceeded);
        }

        // MODEL_SELECT: the chosen tier's estimate stays held until settled.
        let (selection, reservation) = self.router.reserve_model(complexity, estimated_tokens);
        let Some(reservation) = reservation else {
            info!(entry_id, reason = %selection.reason, "No affordable model tier, serving fallback");
            return draft.fallback(&self.router, FallbackReason::BudgetExceeded);
        };
        debug!(
            entry_id,
            persona = %request.persona,
            %complexity,
            model = %selection.model,
            reason = %selection.reason,
            "Model selected"
        );

        // GENERATE
        let tier = self.router.tier(selection.model);
        let completion = CompletionRequest {
            system_prompt: system_prompt(request.persona, request.follow_up.as_ref()),
            content: user_content(&request),
            model: tier.model.clone(),
            max_tokens: tier.max_tokens,
            temperature: self.temperature,
        };
        let attempts = AtomicU32::new(0);
        let result = self.call_provider(&completion, entry_id, &attempts).await;
        let attempts = attempts.load(Ordering::Relaxed);

        // A request cancelled during the await drops its reservation, which
        // releases the hold. Everything below is synchronous.
        let llm_response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(entry_id, error = %e, attempts, "Completion failed, serving fallback");
                drop(reservation);
                return GenerationOutcome {
                    attempts,
                    ..draft.fallback(&self.router, e.fallback_reason())
                };
            }
        };

        let tokens_used = llm_response
            .usage
            .as_ref()
            .map(|u| u64::from(u.total_tokens))
            .unwrap_or_else(|| u64::from(estimated_tokens));
        let cost = self.router.settle(reservation, selection.model, tokens_used);
        let text = self.formatter.clean(llm_response.content_or_empty());

        // SAFETY_CHECK
        let verdict = self.validator.validate(&text);
        if !verdict.is_safe {
            let reason = match verdict.issue {
                Some(SafetyIssue::TooShort | SafetyIssue::TooLong) => FallbackReason::MalformedOutput,
                _ => FallbackReason::UnsafeContent,
            };
            warn!(
                entry_id,
                persona = %request.persona,
                issue = ?verdict.issue,
                "Output failed safety check, serving fallback"
            );
            return GenerationOutcome {
                tokens_used,
                cost,
                attempts,
                ..draft.fallback(&self.router, reason)
            };
        }

        let response = self.formatter.parse_response(&text, draft.elapsed_ms());

        // CACHE_STORE
        if let Some(key) = cache_key {
            self.router.put_cached(
                key,
                CacheValue {
                    response: response.clone(),
                    model_used: selection.model,
                    complexity,
                    tokens_used,
                },
            );
        }

        GenerationOutcome {
            tokens_used,
            cost,
            attempts,
            ..draft.finish(response, selection.model)
        }
    }

    async fn call_provider(
        &self,
        request: &CompletionRequest,
        entry_id: &str,
        attempts: &AtomicU32,
    ) -> HearthResult<LlmResponse> {
        let call_once = || async {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(entry_id, attempt, model = %request.model, "Calling completion service");
            match tokio::time::timeout(self.provider_timeout, self.llm.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(HearthError::timeout(format!(
                    "Completion exceeded {:?}",
                    self.provider_timeout
                ))),
            }
        };

        call_once
            .retry(self.retry.backoff())
            .when(|e: &HearthError| e.is_transient())
            .notify(|err: &HearthError, dur: Duration| {
                warn!(
                    entry_id,
                    error = %err,
                    retry_in_ms = dur.as_millis() as u64,
                    "Completion failed, retrying"
                );
            })
            .await
    }

    /// Respond to a new entry with every persona the selector picks.
    ///
    /// Outcomes come back in selection order, Pulse first when chosen.
    pub async fn respond_to_entry(
        &self,
        entry: &JournalEntry,
        prefs: &UserPreferences,
        history: &[ExistingResponse],
        now: DateTime<Utc>,
    ) -> Vec<GenerationOutcome> {
        let available = self.selector.available_personas(prefs.tier);
        let count = self.selector.count_responders(entry, prefs, history, now);
        let personas = self.selector.choose_personas(entry, &available, count);
        info!(
            entry_id = %entry.id,
            count,
            personas = ?personas,
            "Responding to entry"
        );

        let requests = personas
            .into_iter()
            .map(|persona| self.generate(GenerationRequest::new(entry.clone(), persona)));
        futures::future::join_all(requests).await
    }

    /// Reply to a comment under an entry, if some persona should.
    pub async fn respond_to_comment(
        &self,
        entry: &JournalEntry,
        comment: &UserComment,
        prefs: &UserPreferences,
        responded: &[Persona],
    ) -> Option<GenerationOutcome> {
        let available = self.selector.available_personas(prefs.tier);
        let persona = self
            .selector
            .should_respond_to_comment(comment, &available, responded)?;
        let request = GenerationRequest::new(entry.clone(), persona).with_comment(comment.text.clone());
        Some(self.generate(request).await)
    }
}

impl std::fmt::Debug for GenerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationEngine")
            .field("provider", &self.llm.provider_name())
            .field("retry", &self.retry)
            .field("provider_timeout", &self.provider_timeout)
            .finish()
    }
}

fn user_content(request: &GenerationRequest) -> String {
    let mut content = entry_content(&request.entry);
    if let Some(comment) = &request.comment {
        content.push_str("\n\nThe user replied in the comments: ");
        content.push_str(comment.trim());
    }
    content
}
