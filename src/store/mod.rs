// src/store/mod.rs
//! Persistence contracts. Stages and the worker loops only see these traits;
//! `memory` backs tests, `sqlite` backs the worker binary.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::model::{
    Article, ArticleStatus, Checks, Job, JobCounts, JobKind, JobPayload, JobStatus, Report, Source,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Owns the job lifecycle. Only the dispatcher (and the stage it runs) mutates jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// New job in `pending` with zero attempts.
    async fn enqueue(
        &self,
        kind: JobKind,
        payload: JobPayload,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Job>;

    /// Read-only selection of ready `pending` jobs, oldest first. Does not mark them.
    async fn claim_pending(
        &self,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>>;

    async fn mark_processing(&self, id: Uuid) -> Result<()>;

    async fn mark_completed(&self, id: Uuid) -> Result<()>;

    /// Increment attempts and record `error`; back to `pending` while
    /// attempts < maxAttempts, `failed` otherwise. Returns the updated job.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Job>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>>;

    /// True if a `pending`/`processing` job of `kind` already carries `payload`.
    async fn has_open_job(&self, kind: JobKind, payload: &JobPayload) -> Result<bool>;

    async fn job_counts(&self) -> Result<JobCounts>;

    /// Return jobs stranded in `processing` (worker died mid-stage) to `pending`.
    async fn reset_processing(&self) -> Result<usize>;

    /// Completed/failed jobs created before `cutoff`.
    async fn count_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>>;

    async fn list_sources(&self) -> Result<Vec<Source>>;

    /// Insert or update by unique domain. An existing row keeps its id and lastFetchedAt.
    async fn upsert_source(&self, source: Source) -> Result<Source>;

    async fn record_fetch(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_article(&self, id: Uuid) -> Result<Option<Article>>;

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Fails on a duplicate url or slug.
    async fn insert_article(&self, article: &Article) -> Result<()>;

    /// Store raw text and move the article to `extracted`.
    async fn store_raw_text(&self, id: Uuid, raw_text: &str) -> Result<()>;

    async fn set_article_status(&self, id: Uuid, status: ArticleStatus) -> Result<()>;

    /// Move to `failed`, drop raw text, merge `metadata` into the existing map.
    async fn mark_article_failed(&self, id: Uuid, metadata: Map<String, Value>) -> Result<()>;

    /// Null out raw text on articles fetched before `cutoff`. Returns rows touched.
    async fn purge_raw_text(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Insert, or replace the generated fields of the article's existing report
    /// (keeping its id and review fields). One report per article.
    async fn save_report(&self, report: &Report) -> Result<Report>;

    async fn get_report_for_article(&self, article_id: Uuid) -> Result<Option<Report>>;

    async fn update_report_checks(&self, report_id: Uuid, checks: &Checks) -> Result<()>;
}

/// The three stores handed to stages and loops. One backend may serve all three.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub sources: Arc<dyn SourceRegistry>,
    pub content: Arc<dyn ContentStore>,
}

impl Stores {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: JobStore + SourceRegistry + ContentStore + 'static,
    {
        Self {
            jobs: backend.clone(),
            sources: backend.clone(),
            content: backend,
        }
    }
}
