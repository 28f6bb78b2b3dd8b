//! Background runtime for hearth's periodic jobs.
//!
//! Manages the lifecycle of the [`EngagementScheduler`] and the
//! [`MetricsResetJob`] as background tasks, with unified startup and
//! graceful shutdown.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use crate::error::{HearthError, HearthResult};
use crate::proactive::{EngagementScheduler, EngagementSchedulerConfig, ProactiveScheduler};
use crate::routing::CostRouter;

/// Midnight UTC, every day (sec min hour day month weekday).
pub const DAILY_RESET_CRON: &str = "0 0 0 * * *";
/// Midnight UTC on the first of the month.
pub const MONTHLY_RESET_CRON: &str = "0 0 0 1 * *";

/// Cron jobs that roll the daily and monthly cost buckets.
pub struct MetricsResetJob {
    scheduler: JobScheduler,
    router: Arc<CostRouter>,
}

impl MetricsResetJob {
    /// Create the job and register both schedules.
    ///
    /// Note: Call `start()` to begin execution.
    pub async fn new(
        router: Arc<CostRouter>,
        daily_cron: &str,
        monthly_cron: &str,
    ) -> HearthResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| HearthError::Scheduler(format!("Failed to create reset scheduler: {}", e)))?;

        let daily_router = router.clone();
        let daily = Job::new_async(daily_cron, move |_uuid, _lock| {
            let router = daily_router.clone();
            Box::pin(async move {
                router.reset_daily();
            })
        })
        .map_err(|e| HearthError::Scheduler(format!("Invalid daily reset schedule: {}", e)))?;

        let monthly_router = router.clone();
        let monthly = Job::new_async(monthly_cron, move |_uuid, _lock| {
            let router = monthly_router.clone();
            Box::pin(async move {
                router.reset_monthly();
            })
        })
        .map_err(|e| HearthError::Scheduler(format!("Invalid monthly reset schedule: {}", e)))?;

        for job in [daily, monthly] {
            scheduler
                .add(job)
                .await
                .map_err(|e| HearthError::Scheduler(format!("Failed to add reset job: {}", e)))?;
        }

        Ok(Self { scheduler, router })
    }

    /// Start the cron jobs.
    pub async fn start(&self) -> HearthResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| HearthError::Scheduler(format!("Failed to start reset scheduler: {}", e)))
    }

    /// Stop the cron jobs.
    pub async fn shutdown(&mut self) -> HearthResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| HearthError::Scheduler(format!("Failed to stop reset scheduler: {}", e)))
    }

    /// Router whose buckets are reset.
    pub fn router(&self) -> &Arc<CostRouter> {
        &self.router
    }
}

/// Configuration for the BackgroundRuntime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Interval between engagement cycles in minutes (default: 30).
    pub engagement_interval_minutes: u64,
    /// Whether to run an engagement cycle immediately on start (default: false).
    pub engagement_run_on_start: bool,
    /// Whether to enable the engagement scheduler (default: true).
    pub enable_engagement: bool,
    /// Whether to enable the metrics reset jobs (default: true).
    pub enable_metrics_reset: bool,
    pub daily_reset_cron: String,
    pub monthly_reset_cron: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engagement_interval_minutes: 30,
            engagement_run_on_start: false,
            enable_engagement: true,
            enable_metrics_reset: true,
            daily_reset_cron: DAILY_RESET_CRON.to_string(),
            monthly_reset_cron: MONTHLY_RESET_CRON.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Set the engagement interval.
    pub fn with_engagement_interval(mut self, minutes: u64) -> Self {
        self.engagement_interval_minutes = minutes.max(1);
        self
    }

    /// Run an engagement cycle immediately on start.
    pub fn with_run_on_start(mut self) -> Self {
        self.engagement_run_on_start = true;
        self
    }

    /// Override both reset schedules.
    pub fn with_reset_crons(mut self, daily: impl Into<String>, monthly: impl Into<String>) -> Self {
        self.daily_reset_cron = daily.into();
        self.monthly_reset_cron = monthly.into();
        self
    }

    /// Disable the engagement scheduler.
    pub fn without_engagement(mut self) -> Self {
        self.enable_engagement = false;
        self
    }

    /// Disable the metrics reset jobs.
    pub fn without_metrics_reset(mut self) -> Self {
        self.enable_metrics_reset = false;
        self
    }

    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `HEARTH_ENGAGEMENT_INTERVAL_MINUTES` (default: 30)
    /// - `HEARTH_ENGAGEMENT_RUN_ON_START` (set to enable)
    /// - `HEARTH_DISABLE_ENGAGEMENT` (set to disable)
    /// - `HEARTH_DISABLE_METRICS_RESET` (set to disable)
    /// - `HEARTH_DAILY_RESET_CRON` / `HEARTH_MONTHLY_RESET_CRON`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(interval) = std::env::var("HEARTH_ENGAGEMENT_INTERVAL_MINUTES") {
            if let Ok(minutes) = interval.parse::<u64>() {
                config.engagement_interval_minutes = minutes.max(1);
            }
        }

        if std::env::var("HEARTH_ENGAGEMENT_RUN_ON_START").is_ok() {
            config.engagement_run_on_start = true;
        }

        if std::env::var("HEARTH_DISABLE_ENGAGEMENT").is_ok() {
            config.enable_engagement = false;
        }

        if std::env::var("HEARTH_DISABLE_METRICS_RESET").is_ok() {
            config.enable_metrics_reset = false;
        }

        if let Ok(cron) = std::env::var("HEARTH_DAILY_RESET_CRON") {
            config.daily_reset_cron = cron;
        }

        if let Ok(cron) = std::env::var("HEARTH_MONTHLY_RESET_CRON") {
            config.monthly_reset_cron = cron;
        }

        config
    }
}

/// Background runtime managing scheduler lifecycle.
///
/// # Example
///
/// ```ignore
/// use hearth_core::{BackgroundRuntime, RuntimeConfig};
///
/// let mut runtime = BackgroundRuntime::new(RuntimeConfig::from_env(), proactive).await?;
/// runtime.start().await?;
/// // ... application runs ...
/// runtime.shutdown().await?;
/// ```
pub struct BackgroundRuntime {
    engagement: Option<EngagementScheduler>,
    metrics_reset: Option<MetricsResetJob>,
    proactive: Arc<ProactiveScheduler>,
    config: RuntimeConfig,
}

impl BackgroundRuntime {
    /// Create the schedulers without starting them.
    pub async fn new(config: RuntimeConfig, proactive: Arc<ProactiveScheduler>) -> HearthResult<Self> {
        debug!(
            engagement_enabled = config.enable_engagement,
            metrics_reset_enabled = config.enable_metrics_reset,
            engagement_interval = config.engagement_interval_minutes,
            "Creating BackgroundRuntime"
        );

        let engagement = if config.enable_engagement {
            let scheduler_config = EngagementSchedulerConfig {
                interval_minutes: config.engagement_interval_minutes.max(1),
                run_on_start: config.engagement_run_on_start,
            };
            let scheduler = EngagementScheduler::new(proactive.clone(), scheduler_config)
                .await
                .map_err(|e| HearthError::Scheduler(format!("Failed to create engagement scheduler: {}", e)))?;
            Some(scheduler)
        } else {
            None
        };

        let metrics_reset = if config.enable_metrics_reset {
            let router = proactive.engine().router().clone();
            Some(MetricsResetJob::new(router, &config.daily_reset_cron, &config.monthly_reset_cron).await?)
        } else {
            None
        };

        Ok(Self {
            engagement,
            metrics_reset,
            proactive,
            config,
        })
    }

    /// Start the background schedulers.
    pub async fn start(&self) -> HearthResult<()> {
        debug!("Starting background schedulers");

        if let Some(ref scheduler) = self.engagement {
            scheduler.start().await.map_err(|e| {
                HearthError::Scheduler(format!("Failed to start engagement scheduler: {}", e))
            })?;
        }

        if let Some(ref job) = self.metrics_reset {
            job.start().await?;
            info!(
                daily = %self.config.daily_reset_cron,
                monthly = %self.config.monthly_reset_cron,
                "Metrics reset jobs started"
            );
        }

        info!("Background schedulers started");
        Ok(())
    }

    /// Shutdown the background schedulers gracefully.
    pub async fn shutdown(&mut self) -> HearthResult<()> {
        debug!("Shutting down background schedulers");

        if let Some(ref mut scheduler) = self.engagement {
            scheduler.shutdown().await.map_err(|e| {
                HearthError::Scheduler(format!("Failed to shutdown engagement scheduler: {}", e))
            })?;
            debug!("Engagement scheduler stopped");
        }

        if let Some(ref mut job) = self.metrics_reset {
            job.shutdown().await?;
            debug!("Metrics reset jobs stopped");
        }

        info!("Background schedulers stopped");
        Ok(())
    }

    /// Get the engagement scheduler.
    pub fn engagement_scheduler(&self) -> Option<&EngagementScheduler> {
        self.engagement.as_ref()
    }

    /// Get the metrics reset job.
    pub fn metrics_reset(&self) -> Option<&MetricsResetJob> {
        self.metrics_reset.as_ref()
    }

    /// Get the proactive scheduler.
    pub fn proactive(&self) -> Arc<ProactiveScheduler> {
        self.proactive.clone()
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
