// src/worker/scheduler.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Shutdown;
use crate::config::PipelineConfig;
use crate::model::{JobKind, JobPayload, Source};
use crate::store::Stores;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub startup_delay: Duration,
    pub cleanup_interval: Duration,
    pub raw_text_retention: chrono::Duration,
    pub job_retention: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for SchedulerConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            interval: cfg.scheduler_interval(),
            startup_delay: cfg.startup_delay(),
            cleanup_interval: cfg.cleanup_interval(),
            raw_text_retention: cfg.raw_text_retention(),
            job_retention: cfg.job_retention(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Active sources with a feed URL.
    pub eligible: usize,
    pub enqueued: usize,
    /// Inside their rate-limit window.
    pub rate_limited: usize,
    /// A fetch for the source is already pending or running.
    pub already_queued: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub raw_text_purged: usize,
    pub stale_terminal_jobs: usize,
}

/// Periodic trigger for fetch jobs and retention cleanup.
#[derive(Clone)]
pub struct Scheduler {
    stores: Stores,
    cfg: SchedulerConfig,
}

impl Scheduler {
    pub fn new(stores: Stores, cfg: SchedulerConfig) -> Self {
        Self { stores, cfg }
    }

    /// Enqueue a `fetch` job for every source whose rate-limit window has elapsed.
    /// A failure on one source is logged and does not stop the pass.
    pub async fn enqueue_due_fetches(&self, now: DateTime<Utc>) -> anyhow::Result<ScheduleReport> {
        let sources = self.stores.sources.list_sources().await?;
        let mut report = ScheduleReport::default();

        for source in sources.iter().filter(|s| s.is_fetchable()) {
            report.eligible += 1;
            if !source.is_due(now) {
                report.rate_limited += 1;
                debug!(target: "scheduler", source = %source.name, "inside rate-limit window");
                continue;
            }
            match self.enqueue_fetch(source).await {
                Ok(true) => report.enqueued += 1,
                Ok(false) => report.already_queued += 1,
                Err(e) => {
                    report.errors += 1;
                    warn!(target: "scheduler", error = ?e, source = %source.name, "could not schedule fetch");
                }
            }
        }

        info!(
            target: "scheduler",
            eligible = report.eligible,
            enqueued = report.enqueued,
            rate_limited = report.rate_limited,
            already_queued = report.already_queued,
            errors = report.errors,
            "fetch pass"
        );
        Ok(report)
    }

    async fn enqueue_fetch(&self, source: &Source) -> anyhow::Result<bool> {
        let payload = JobPayload::source(source.id);
        if self.stores.jobs.has_open_job(JobKind::Fetch, &payload).await? {
            return Ok(false);
        }
        crate::stages::enqueue(&self.stores, JobKind::Fetch, payload).await?;
        Ok(true)
    }

    /// Soft retention: purge raw text past its window and report (not delete)
    /// terminal jobs past theirs.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> anyhow::Result<CleanupReport> {
        let raw_text_purged = self
            .stores
            .content
            .purge_raw_text(now - self.cfg.raw_text_retention)
            .await?;
        let stale_terminal_jobs = self
            .stores
            .jobs
            .count_terminal_before(now - self.cfg.job_retention)
            .await?;

        info!(
            target: "scheduler",
            raw_text_purged,
            stale_terminal_jobs,
            "retention cleanup"
        );
        Ok(CleanupReport {
            raw_text_purged,
            stale_terminal_jobs,
        })
    }

    /// After `startup_delay`, run a fetch pass every `interval` and a cleanup
    /// every `cleanup_interval` until shutdown.
    pub fn spawn(self, mut shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                target: "scheduler",
                interval_secs = self.cfg.interval.as_secs(),
                "scheduler started"
            );
            if shutdown.sleep(self.cfg.startup_delay).await {
                return;
            }

            let mut next_fetch = Instant::now();
            let mut next_cleanup = Instant::now();
            loop {
                let tick = Instant::now();
                if tick >= next_fetch {
                    if let Err(e) = self.enqueue_due_fetches(Utc::now()).await {
                        warn!(target: "scheduler", error = ?e, "fetch pass failed");
                    }
                    next_fetch = tick + self.cfg.interval;
                }
                if tick >= next_cleanup {
                    if let Err(e) = self.cleanup(Utc::now()).await {
                        warn!(target: "scheduler", error = ?e, "cleanup failed");
                    }
                    next_cleanup = tick + self.cfg.cleanup_interval;
                }

                let wake = next_fetch.min(next_cleanup);
                if shutdown.sleep(wake.saturating_duration_since(Instant::now())).await {
                    break;
                }
            }
            info!(target: "scheduler", "scheduler stopped");
        })
    }
}
