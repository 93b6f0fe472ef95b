// src/pipeline.rs
//! Wiring: one `Pipeline` owns the stages plus scheduler/dispatcher configuration
//! and starts both loops as tokio tasks.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analyze::{AiCapabilities, SimilarityScorer};
use crate::config::{PipelineConfig, SourceSeed};
use crate::http::HttpFetcher;
use crate::stages::{StageLimits, Stages};
use crate::store::Stores;
use crate::worker::{
    shutdown_channel, Dispatcher, DispatcherConfig, Scheduler, SchedulerConfig, ShutdownTrigger,
};

#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<Stages>,
    dispatcher_cfg: DispatcherConfig,
    scheduler_cfg: SchedulerConfig,
}

impl Pipeline {
    pub fn new(
        stores: Stores,
        http: Arc<dyn HttpFetcher>,
        ai: AiCapabilities,
        similarity: Arc<dyn SimilarityScorer>,
        cfg: &PipelineConfig,
    ) -> Self {
        let stages = Stages::new(stores, http, ai, similarity, StageLimits::from(cfg));
        Self {
            stages: Arc::new(stages),
            dispatcher_cfg: DispatcherConfig::from(cfg),
            scheduler_cfg: SchedulerConfig::from(cfg),
        }
    }

    pub fn stages(&self) -> &Arc<Stages> {
        &self.stages
    }

    pub fn stores(&self) -> &Stores {
        self.stages.stores()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.stages.clone(), self.dispatcher_cfg)
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.stores().clone(), self.scheduler_cfg)
    }

    /// Upsert configured sources by domain. Returns how many were written.
    pub async fn seed_sources(&self, seeds: Vec<SourceSeed>) -> Result<usize> {
        let mut written = 0;
        for seed in seeds {
            let domain = seed.domain.clone();
            match self.stores().sources.upsert_source(seed.into_source()).await {
                Ok(_) => written += 1,
                Err(e) => warn!(error = ?e, %domain, "could not seed source"),
            }
        }
        Ok(written)
    }

    /// Put jobs stranded in `processing` by a previous run back to `pending`.
    pub async fn recover(&self) -> Result<usize> {
        let n = self.stores().jobs.reset_processing().await?;
        if n > 0 {
            info!(recovered = n, "interrupted jobs returned to pending");
        }
        Ok(n)
    }

    /// Start scheduler and dispatcher tasks.
    pub fn spawn(&self) -> PipelineHandle {
        let (trigger, shutdown) = shutdown_channel();
        let tasks = vec![
            self.scheduler().spawn(shutdown.clone()),
            self.dispatcher().spawn(shutdown),
        ];
        PipelineHandle { trigger, tasks }
    }
}

/// Running loops. Dropping the handle without `shutdown` also stops them at
/// their next wait.
pub struct PipelineHandle {
    trigger: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Stop periodic triggers and wait for the in-flight cycle to finish.
    pub async fn shutdown(self) {
        self.trigger.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = ?e, "pipeline task ended abnormally");
            }
        }
        info!("pipeline stopped");
    }
}
