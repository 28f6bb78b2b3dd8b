//! Periodic driver for the proactive cycle.
//!
//! Uses tokio-cron-scheduler to run [`ProactiveScheduler::run_cycle`] on a
//! fixed interval, independent of live request traffic.

use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info};

use super::executor::{CycleReport, ProactiveScheduler};
use crate::error::HearthResult;

/// Configuration for the engagement scheduler.
#[derive(Debug, Clone)]
pub struct EngagementSchedulerConfig {
    /// Interval between cycles in minutes (default: 30)
    pub interval_minutes: u64,
    /// Whether to run a cycle immediately on start (default: false)
    pub run_on_start: bool,
}

impl Default for EngagementSchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            run_on_start: false,
        }
    }
}

impl EngagementSchedulerConfig {
    /// Create config with custom interval.
    pub fn with_interval(interval_minutes: u64) -> Self {
        Self {
            interval_minutes: interval_minutes.max(1), // Minimum 1 minute
            ..Default::default()
        }
    }

    /// Enable running a cycle immediately on start.
    pub fn with_run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }
}

fn log_report(report: &CycleReport) {
    info!(
        users = report.users,
        found = report.found,
        executed = report.executed,
        skipped = report.skipped,
        deferred = report.deferred,
        failed = report.failed,
        failed_users = report.failed_users,
        duration_ms = report.duration_ms().unwrap_or(0),
        "Engagement cycle complete"
    );
}

/// Runs proactive scan and execution for all active users on an interval.
pub struct EngagementScheduler {
    scheduler: JobScheduler,
    proactive: Arc<ProactiveScheduler>,
    config: EngagementSchedulerConfig,
}

impl EngagementScheduler {
    /// Create a new scheduler.
    ///
    /// Note: Call `start()` to begin periodic execution.
    pub async fn new(
        proactive: Arc<ProactiveScheduler>,
        config: EngagementSchedulerConfig,
    ) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            proactive,
            config,
        })
    }

    /// Get the scheduler configuration.
    pub fn config(&self) -> &EngagementSchedulerConfig {
        &self.config
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        let proactive = self.proactive.clone();
        let interval_secs = self.config.interval_minutes * 60;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval_secs),
            move |_uuid, _lock| {
                let proactive = proactive.clone();
                Box::pin(async move {
                    debug!("Starting engagement cycle");
                    match proactive.run_cycle(Utc::now()).await {
                        Ok(report) => log_report(&report),
                        Err(e) => error!(error = %e, "Engagement cycle failed"),
                    }
                })
            },
        )?;

        self.scheduler.add(job).await?;

        if self.config.run_on_start {
            debug!("Running initial engagement cycle on start");
            match self.proactive.run_cycle(Utc::now()).await {
                Ok(report) => log_report(&report),
                Err(e) => error!(error = %e, "Initial engagement cycle failed"),
            }
        }

        self.scheduler.start().await?;

        info!(
            interval_minutes = self.config.interval_minutes,
            "Engagement scheduler started"
        );

        Ok(())
    }

    /// Stop the scheduler gracefully.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        info!("Shutting down engagement scheduler");
        self.scheduler.shutdown().await
    }

    /// Run one cycle now, outside the scheduled interval.
    pub async fn run_now(&self) -> HearthResult<CycleReport> {
        self.proactive.run_cycle(Utc::now()).await
    }

    /// Get the underlying proactive scheduler.
    pub fn proactive(&self) -> &Arc<ProactiveScheduler> {
        &self.proactive
    }
}
