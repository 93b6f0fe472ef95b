// src/worker/dispatcher.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Shutdown;
use crate::config::PipelineConfig;
use crate::error::{StageError, StageResult};
use crate::model::{Job, JobKind, JobStatus};
use crate::stages::Stages;
use crate::store::Stores;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub batch_size: usize,
    /// Pause between cycles.
    pub idle: Duration,
    /// Pause after a cycle that could not even load its batch.
    pub error_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for DispatcherConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            batch_size: cfg.dispatcher_batch_size.max(1),
            idle: cfg.idle_delay(),
            error_backoff: cfg.error_backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub completed: usize,
    /// Failed attempts that will be retried.
    pub retried: usize,
    /// Failed attempts that exhausted the job's budget.
    pub failed: usize,
    /// Jobs skipped because the store rejected a status update.
    pub skipped: usize,
}

/// Pulls ready jobs and runs them one at a time.
#[derive(Clone)]
pub struct Dispatcher {
    stores: Stores,
    stages: Arc<Stages>,
    cfg: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(stages: Arc<Stages>, cfg: DispatcherConfig) -> Self {
        Self {
            stores: stages.stores().clone(),
            stages,
            cfg,
        }
    }

    /// One cycle: claim up to `batch_size` ready jobs and process each in turn.
    /// Only a failure to load the batch is returned as an error; per-job
    /// failures are recorded on the job.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> anyhow::Result<CycleReport> {
        let jobs = self
            .stores
            .jobs
            .claim_pending(None, self.cfg.batch_size, now)
            .await?;
        crate::metrics::dispatcher_cycle(now.timestamp());

        let mut report = CycleReport {
            claimed: jobs.len(),
            ..Default::default()
        };
        for job in &jobs {
            match self.process(job).await {
                Some(JobStatus::Completed) => report.completed += 1,
                Some(JobStatus::Failed) => report.failed += 1,
                Some(_) => report.retried += 1,
                None => report.skipped += 1,
            }
        }
        if report.claimed > 0 {
            info!(
                target: "dispatcher",
                claimed = report.claimed,
                completed = report.completed,
                retried = report.retried,
                failed = report.failed,
                "cycle finished"
            );
        }
        Ok(report)
    }

    /// Run one job and reconcile its status. Returns the job's resulting status,
    /// or `None` when a status write failed (the job is left for a later cycle
    /// or for startup recovery).
    pub async fn process(&self, job: &Job) -> Option<JobStatus> {
        if let Err(e) = self.stores.jobs.mark_processing(job.id).await {
            warn!(target: "dispatcher", error = ?e, job_id = %job.id, "could not mark job processing");
            return None;
        }

        let started = Instant::now();
        match self.execute(job).await {
            Ok(()) => {
                if let Err(e) = self.stores.jobs.mark_completed(job.id).await {
                    warn!(target: "dispatcher", error = ?e, job_id = %job.id, "could not mark job completed");
                    return None;
                }
                crate::metrics::job_completed(job.kind, started.elapsed());
                debug!(target: "dispatcher", job_id = %job.id, kind = %job.kind, "job completed");
                Some(JobStatus::Completed)
            }
            Err(err) => {
                let message = err.to_string();
                match self.stores.jobs.mark_failed(job.id, &message).await {
                    Ok(updated) => {
                        let terminal = updated.status == JobStatus::Failed;
                        crate::metrics::job_failed(job.kind, terminal, started.elapsed());
                        warn!(
                            target: "dispatcher",
                            job_id = %job.id,
                            kind = %job.kind,
                            attempts = updated.attempts,
                            max_attempts = updated.max_attempts,
                            terminal,
                            class = ?err.class(),
                            error = %message,
                            "job attempt failed"
                        );
                        Some(updated.status)
                    }
                    Err(e) => {
                        warn!(target: "dispatcher", error = ?e, job_id = %job.id, stage_error = %message, "could not record job failure");
                        None
                    }
                }
            }
        }
    }

    /// Route by job kind. Adding a kind without a stage does not compile.
    async fn execute(&self, job: &Job) -> StageResult<()> {
        let payload = &job.payload;
        let article_id = || {
            payload.article_id.ok_or(StageError::InvalidPayload {
                kind: job.kind,
                field: "articleId",
            })
        };
        match job.kind {
            JobKind::Fetch => {
                let source_id = payload.source_id.ok_or(StageError::InvalidPayload {
                    kind: job.kind,
                    field: "sourceId",
                })?;
                self.stages.fetch(source_id).await.map(|_| ())
            }
            JobKind::Extract => self.stages.extract(article_id()?).await.map(|_| ()),
            JobKind::Humanize => self.stages.humanize(article_id()?).await.map(|_| ()),
            JobKind::FactCheck => self.stages.fact_check(article_id()?).await.map(|_| ()),
        }
    }

    /// Loop until shutdown: `idle` between cycles, `error_backoff` after a cycle
    /// that failed before processing anything.
    pub fn spawn(self, mut shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(target: "dispatcher", batch = self.cfg.batch_size, "dispatcher started");
            loop {
                if shutdown.is_triggered() {
                    break;
                }
                let pause = match self.run_cycle(Utc::now()).await {
                    Ok(_) => self.cfg.idle,
                    Err(e) => {
                        warn!(target: "dispatcher", error = ?e, "cycle failed; backing off");
                        self.cfg.error_backoff
                    }
                };
                if shutdown.sleep(pause).await {
                    break;
                }
            }
            info!(target: "dispatcher", "dispatcher stopped");
        })
    }
}
