// src/stages/mod.rs
//! The four pipeline stages. Each one checks its article precondition, does its
//! work through the injected collaborators, and enqueues the next stage's job.

pub mod extract;
pub mod fact_check;
pub mod fetch;
pub mod humanize;

use std::sync::Arc;

use crate::analyze::{AiCapabilities, SimilarityScorer};
use crate::config::PipelineConfig;
use crate::error::StageResult;
use crate::http::HttpFetcher;
use crate::model::{Job, JobKind, JobPayload};
use crate::store::Stores;

pub use fetch::FetchSummary;

/// Size limits applied inside the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageLimits {
    pub feed_entry_cap: usize,
    pub min_text_chars: usize,
    pub generation_char_limit: usize,
    pub verification_char_limit: usize,
    pub max_quotes: usize,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for StageLimits {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            feed_entry_cap: cfg.feed_entry_cap,
            min_text_chars: cfg.min_text_chars,
            generation_char_limit: cfg.generation_char_limit,
            verification_char_limit: cfg.verification_char_limit,
            max_quotes: cfg.max_quotes,
        }
    }
}

/// Collaborators shared by every stage.
#[derive(Clone)]
pub struct Stages {
    pub(crate) stores: Stores,
    pub(crate) http: Arc<dyn HttpFetcher>,
    pub(crate) ai: AiCapabilities,
    pub(crate) similarity: Arc<dyn SimilarityScorer>,
    pub(crate) limits: StageLimits,
}

impl Stages {
    pub fn new(
        stores: Stores,
        http: Arc<dyn HttpFetcher>,
        ai: AiCapabilities,
        similarity: Arc<dyn SimilarityScorer>,
        limits: StageLimits,
    ) -> Self {
        Self {
            stores,
            http,
            ai,
            similarity,
            limits,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn limits(&self) -> StageLimits {
        self.limits
    }

    async fn enqueue_next(&self, kind: JobKind, payload: JobPayload) -> StageResult<Job> {
        enqueue(&self.stores, kind, payload).await.map_err(Into::into)
    }
}

/// Enqueue through the job store and count it.
pub(crate) async fn enqueue(
    stores: &Stores,
    kind: JobKind,
    payload: JobPayload,
) -> anyhow::Result<Job> {
    let job = stores.jobs.enqueue(kind, payload, None).await?;
    crate::metrics::job_enqueued(kind);
    tracing::debug!(job_id = %job.id, kind = %kind, "job enqueued");
    Ok(job)
}
