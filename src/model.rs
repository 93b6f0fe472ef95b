// src/model.rs
//! Records moved through the pipeline: sources, articles, reports and jobs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Polls per hour for a source that does not set its own limit.
pub const DEFAULT_RATE_LIMIT_PER_HOUR: u32 = 4;

// ------------------------------------------------------------
// Source
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub feed_url: Option<String>,
    pub category: String,
    pub active: bool,
    pub rate_limit_per_hour: u32,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, feed_url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            domain: domain.into(),
            feed_url,
            category: "general".to_string(),
            active: true,
            rate_limit_per_hour: DEFAULT_RATE_LIMIT_PER_HOUR,
            last_fetched_at: None,
        }
    }

    /// Minimum spacing between two polls: 3_600_000 ms / rateLimitPerHour.
    /// A zero rate limit is treated as one poll per hour.
    pub fn min_fetch_interval(&self) -> Duration {
        let per_hour = i64::from(self.rate_limit_per_hour.max(1));
        Duration::milliseconds(3_600_000 / per_hour)
    }

    /// Only active sources with a feed URL are ever polled.
    pub fn is_fetchable(&self) -> bool {
        self.active && self.feed_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// True once the rate-limit window since the last poll has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_fetched_at {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.min_fetch_interval(),
        }
    }
}

// ------------------------------------------------------------
// Article
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Fetched,
    Extracted,
    Humanized,
    Published,
    Rejected,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Fetched => "fetched",
            ArticleStatus::Extracted => "extracted",
            ArticleStatus::Humanized => "humanized",
            ArticleStatus::Published => "published",
            ArticleStatus::Rejected => "rejected",
            ArticleStatus::Failed => "failed",
        }
    }

    /// No automated transition leaves these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArticleStatus::Published | ArticleStatus::Rejected | ArticleStatus::Failed
        )
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetched" => Ok(ArticleStatus::Fetched),
            "extracted" => Ok(ArticleStatus::Extracted),
            "humanized" => Ok(ArticleStatus::Humanized),
            "published" => Ok(ArticleStatus::Published),
            "rejected" => Ok(ArticleStatus::Rejected),
            "failed" => Ok(ArticleStatus::Failed),
            other => anyhow::bail!("unknown article status '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub slug: String,
    pub source_id: Option<Uuid>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub raw_text: Option<String>,
    pub authors: Vec<String>,
    pub category: String,
    pub status: ArticleStatus,
    pub metadata: Map<String, Value>,
}

impl Article {
    pub fn has_raw_text(&self) -> bool {
        self.raw_text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

// ------------------------------------------------------------
// Report
// ------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Entities {
    pub persons: Vec<String>,
    pub orgs: Vec<String>,
    pub places: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactCheck {
    pub claim: String,
    pub verified: bool,
    /// 0–100
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Checks {
    pub fact_checks: Vec<FactCheck>,
    pub quoted_texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub article_id: Uuid,
    pub tldr: String,
    pub bullets: Vec<String>,
    pub rendered_body: String,
    pub plain_body: String,
    pub entities: Entities,
    pub ai_confidence_score: u8,
    pub similarity_score: u8,
    pub checks: Checks,
    // Review fields belong to the external review workflow; the pipeline only reads them.
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ------------------------------------------------------------
// Job
// ------------------------------------------------------------

/// Closed set of job types; the dispatcher matches on it exhaustively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobKind {
    #[serde(rename = "fetch")]
    Fetch,
    #[serde(rename = "extract")]
    Extract,
    #[serde(rename = "humanize")]
    Humanize,
    #[serde(rename = "fact-check")]
    FactCheck,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Fetch,
        JobKind::Extract,
        JobKind::Humanize,
        JobKind::FactCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Fetch => "fetch",
            JobKind::Extract => "extract",
            JobKind::Humanize => "humanize",
            JobKind::FactCheck => "fact-check",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown job type '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => anyhow::bail!("unknown job status '{other}'"),
        }
    }
}

/// Key-value payload carried by a job. Stored as JSON, e.g. `{"sourceId": "..."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<Uuid>,
}

impl JobPayload {
    pub fn source(id: Uuid) -> Self {
        Self {
            source_id: Some(id),
            article_id: None,
        }
    }

    pub fn article(id: Uuid) -> Self {
        Self {
            source_id: None,
            article_id: Some(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        kind: JobKind,
        payload: JobPayload,
        scheduled_for: Option<DateTime<Utc>>,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Pending,
            payload,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
            scheduled_for,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Pending and not scheduled into the future.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_for.map_or(true, |at| at <= now)
    }

    /// Retry bookkeeping shared by every store: bump attempts (never past
    /// `max_attempts`), record the error, and pick pending vs failed.
    pub fn record_failure(&mut self, error: &str, now: DateTime<Utc>) {
        self.attempts = (self.attempts + 1).min(self.max_attempts);
        self.last_error = Some(error.to_string());
        if self.attempts >= self.max_attempts {
            self.status = JobStatus::Failed;
            self.completed_at = Some(now);
        } else {
            self.status = JobStatus::Pending;
        }
    }
}

/// Per-status job totals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn add(&mut self, status: JobStatus, n: u64) {
        match status {
            JobStatus::Pending => self.pending += n,
            JobStatus::Processing => self.processing += n,
            JobStatus::Completed => self.completed += n,
            JobStatus::Failed => self.failed += n,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }
}
