// src/store/memory.rs
//! In-memory backend. Same uniqueness rules as the durable store; used by tests
//! and local dry runs.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{ContentStore, JobStore, SourceRegistry};
use crate::model::{
    Article, ArticleStatus, Checks, Job, JobCounts, JobKind, JobPayload, JobStatus, Report, Source,
    DEFAULT_MAX_ATTEMPTS,
};

#[derive(Debug, Default)]
struct Inner {
    sources: HashMap<Uuid, Source>,
    articles: HashMap<Uuid, Article>,
    reports: HashMap<Uuid, Report>,
    jobs: HashMap<Uuid, Job>,
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    max_attempts: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))
    }

    /// Snapshot of every article, for assertions.
    pub fn articles(&self) -> Result<Vec<Article>> {
        Ok(self.lock()?.articles.values().cloned().collect())
    }

    /// Snapshot of every job, oldest first.
    pub fn jobs(&self) -> Result<Vec<Job>> {
        let mut v: Vec<Job> = self.lock()?.jobs.values().cloned().collect();
        v.sort_by_key(|j| j.created_at);
        Ok(v)
    }

    /// Direct write used by tests to seed or rewind records.
    pub fn put_article(&self, article: Article) -> Result<()> {
        self.lock()?.articles.insert(article.id, article);
        Ok(())
    }

    pub fn put_job(&self, job: Job) -> Result<()> {
        self.lock()?.jobs.insert(job.id, job);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(
        &self,
        kind: JobKind,
        payload: JobPayload,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Job> {
        let job = Job::new(kind, payload, scheduled_for, self.max_attempts);
        self.lock()?.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim_pending(
        &self,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>> {
        let g = self.lock()?;
        let mut ready: Vec<Job> = g
            .jobs
            .values()
            .filter(|j| j.is_ready(now) && kind.map_or(true, |k| j.kind == k))
            .cloned()
            .collect();
        ready.sort_by_key(|j| j.created_at);
        ready.truncate(limit);
        Ok(ready)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        let mut g = self.lock()?;
        let job = g.jobs.get_mut(&id).ok_or_else(|| anyhow!("job {id} not found"))?;
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        let mut g = self.lock()?;
        let job = g.jobs.get_mut(&id).ok_or_else(|| anyhow!("job {id} not found"))?;
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Job> {
        let mut g = self.lock()?;
        let job = g.jobs.get_mut(&id).ok_or_else(|| anyhow!("job {id} not found"))?;
        job.record_failure(error, Utc::now());
        Ok(job.clone())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>> {
        let g = self.lock()?;
        let mut v: Vec<Job> = g
            .jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        v.truncate(limit);
        Ok(v)
    }

    async fn has_open_job(&self, kind: JobKind, payload: &JobPayload) -> Result<bool> {
        let g = self.lock()?;
        Ok(g.jobs.values().any(|j| {
            j.kind == kind
                && &j.payload == payload
                && matches!(j.status, JobStatus::Pending | JobStatus::Processing)
        }))
    }

    async fn job_counts(&self) -> Result<JobCounts> {
        let g = self.lock()?;
        let mut counts = JobCounts::default();
        for j in g.jobs.values() {
            counts.add(j.status, 1);
        }
        Ok(counts)
    }

    async fn reset_processing(&self) -> Result<usize> {
        let mut g = self.lock()?;
        let mut n = 0;
        for j in g.jobs.values_mut() {
            if j.status == JobStatus::Processing {
                j.status = JobStatus::Pending;
                j.started_at = None;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn count_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let g = self.lock()?;
        Ok(g
            .jobs
            .values()
            .filter(|j| j.status.is_terminal() && j.created_at < cutoff)
            .count())
    }
}

#[async_trait]
impl SourceRegistry for MemoryStore {
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        Ok(self.lock()?.sources.get(&id).cloned())
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let mut v: Vec<Source> = self.lock()?.sources.values().cloned().collect();
        v.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(v)
    }

    async fn upsert_source(&self, mut source: Source) -> Result<Source> {
        let mut g = self.lock()?;
        if let Some(existing) = g.sources.values().find(|s| s.domain == source.domain) {
            source.id = existing.id;
            source.last_fetched_at = existing.last_fetched_at;
        }
        g.sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn record_fetch(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut g = self.lock()?;
        let s = g
            .sources
            .get_mut(&id)
            .ok_or_else(|| anyhow!("source {id} not found"))?;
        s.last_fetched_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.lock()?.articles.get(&id).cloned())
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        Ok(self
            .lock()?
            .articles
            .values()
            .find(|a| a.url == url)
            .cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.lock()?.articles.values().any(|a| a.slug == slug))
    }

    async fn insert_article(&self, article: &Article) -> Result<()> {
        let mut g = self.lock()?;
        if g.articles.values().any(|a| a.url == article.url) {
            bail!("article url already exists: {}", article.url);
        }
        if g.articles.values().any(|a| a.slug == article.slug) {
            bail!("article slug already exists: {}", article.slug);
        }
        g.articles.insert(article.id, article.clone());
        Ok(())
    }

    async fn store_raw_text(&self, id: Uuid, raw_text: &str) -> Result<()> {
        let mut g = self.lock()?;
        let a = g
            .articles
            .get_mut(&id)
            .ok_or_else(|| anyhow!("article {id} not found"))?;
        a.raw_text = Some(raw_text.to_string());
        a.status = ArticleStatus::Extracted;
        Ok(())
    }

    async fn set_article_status(&self, id: Uuid, status: ArticleStatus) -> Result<()> {
        let mut g = self.lock()?;
        let a = g
            .articles
            .get_mut(&id)
            .ok_or_else(|| anyhow!("article {id} not found"))?;
        a.status = status;
        Ok(())
    }

    async fn mark_article_failed(&self, id: Uuid, metadata: Map<String, Value>) -> Result<()> {
        let mut g = self.lock()?;
        let a = g
            .articles
            .get_mut(&id)
            .ok_or_else(|| anyhow!("article {id} not found"))?;
        a.status = ArticleStatus::Failed;
        a.raw_text = None;
        a.metadata.extend(metadata);
        Ok(())
    }

    async fn purge_raw_text(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut g = self.lock()?;
        let mut n = 0;
        for a in g.articles.values_mut() {
            if a.fetched_at < cutoff && a.raw_text.is_some() {
                a.raw_text = None;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn save_report(&self, report: &Report) -> Result<Report> {
        let mut g = self.lock()?;
        let mut saved = report.clone();
        if let Some(existing) = g.reports.values().find(|r| r.article_id == report.article_id) {
            saved.id = existing.id;
            saved.created_at = existing.created_at;
            saved.reviewed_by = existing.reviewed_by.clone();
            saved.reviewed_at = existing.reviewed_at;
            saved.review_notes = existing.review_notes.clone();
        }
        g.reports.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get_report_for_article(&self, article_id: Uuid) -> Result<Option<Report>> {
        Ok(self
            .lock()?
            .reports
            .values()
            .find(|r| r.article_id == article_id)
            .cloned())
    }

    async fn update_report_checks(&self, report_id: Uuid, checks: &Checks) -> Result<()> {
        let mut g = self.lock()?;
        let r = g
            .reports
            .get_mut(&report_id)
            .ok_or_else(|| anyhow!("report {report_id} not found"))?;
        r.checks = checks.clone();
        Ok(())
    }
}
