// src/store/sqlite.rs
//! Durable backend on SQLite. Uniqueness (article url/slug, source domain,
//! one report per article) is enforced by the schema. Timestamps are stored as
//! unix milliseconds, JSON-shaped fields as TEXT.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ContentStore, JobStore, SourceRegistry};
use crate::model::{
    Article, ArticleStatus, Checks, Entities, Job, JobCounts, JobKind, JobPayload, JobStatus,
    Report, Source, DEFAULT_MAX_ATTEMPTS,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        domain TEXT NOT NULL UNIQUE,
        feed_url TEXT,
        category TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        rate_limit_per_hour INTEGER NOT NULL DEFAULT 4,
        last_fetched_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        source_id TEXT,
        published_at INTEGER NOT NULL,
        fetched_at INTEGER NOT NULL,
        raw_text TEXT,
        authors TEXT NOT NULL DEFAULT '[]',
        category TEXT NOT NULL,
        status TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status)",
    "CREATE INDEX IF NOT EXISTS idx_articles_fetched_at ON articles(fetched_at)",
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id TEXT PRIMARY KEY,
        article_id TEXT NOT NULL UNIQUE,
        tldr TEXT NOT NULL,
        bullets TEXT NOT NULL,
        rendered_body TEXT NOT NULL,
        plain_body TEXT NOT NULL,
        entities TEXT NOT NULL,
        ai_confidence_score INTEGER NOT NULL,
        similarity_score INTEGER NOT NULL,
        checks TEXT NOT NULL,
        reviewed_by TEXT,
        reviewed_at INTEGER,
        review_notes TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        status TEXT NOT NULL,
        payload TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        max_attempts INTEGER NOT NULL DEFAULT 3,
        last_error TEXT,
        scheduled_for INTEGER,
        started_at INTEGER,
        completed_at INTEGER,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at)",
];

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_attempts: u32,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply the schema.
    /// `sqlite::memory:` gets a single connection so every query sees the same database.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        if !in_memory {
            ensure_parent_dir(url)?;
        }
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            // Closing the only connection would drop the database.
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options
            .connect(url)
            .await
            .with_context(|| format!("connecting to {url}"))?;

        if !in_memory {
            sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        }
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        info!(%url, "job/content store ready");

        Ok(Self {
            pool,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Rows whose type no longer parses are failed on the spot instead of
    /// poisoning every claim.
    /// Terminally fail a pending row that cannot be turned into a `Job`
    /// (unknown type, bad payload) so it stops heading every claim.
    async fn fail_undecodable_job(&self, id: &str, reason: &str) -> Result<()> {
        warn!(job_id = %id, %reason, "undecodable job row, failing job");
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', attempts = max_attempts, last_error = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(reason)
        .bind(to_ms(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

// ------------------------------------------------------------
// Column helpers
// ------------------------------------------------------------

fn to_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_ms(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

fn opt_from_ms(ms: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    ms.map(from_ms).transpose()
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("invalid uuid '{s}'"))
}

fn row_to_source(row: &SqliteRow) -> Result<Source> {
    Ok(Source {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        feed_url: row.try_get("feed_url")?,
        category: row.try_get("category")?,
        active: row.try_get::<i64, _>("active")? != 0,
        rate_limit_per_hour: u32::try_from(row.try_get::<i64, _>("rate_limit_per_hour")?)
            .unwrap_or(1),
        last_fetched_at: opt_from_ms(row.try_get("last_fetched_at")?)?,
    })
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let source_id: Option<String> = row.try_get("source_id")?;
    let authors: String = row.try_get("authors")?;
    let metadata: String = row.try_get("metadata")?;
    let status: String = row.try_get("status")?;
    Ok(Article {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        source_id: source_id.as_deref().map(parse_uuid).transpose()?,
        published_at: from_ms(row.try_get("published_at")?)?,
        fetched_at: from_ms(row.try_get("fetched_at")?)?,
        raw_text: row.try_get("raw_text")?,
        authors: serde_json::from_str(&authors).context("decoding authors")?,
        category: row.try_get("category")?,
        status: status.parse()?,
        metadata: serde_json::from_str(&metadata).context("decoding metadata")?,
    })
}

fn row_to_report(row: &SqliteRow) -> Result<Report> {
    let bullets: String = row.try_get("bullets")?;
    let entities: String = row.try_get("entities")?;
    let checks: String = row.try_get("checks")?;
    Ok(Report {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        article_id: parse_uuid(&row.try_get::<String, _>("article_id")?)?,
        tldr: row.try_get("tldr")?,
        bullets: serde_json::from_str(&bullets).context("decoding bullets")?,
        rendered_body: row.try_get("rendered_body")?,
        plain_body: row.try_get("plain_body")?,
        entities: serde_json::from_str::<Entities>(&entities).context("decoding entities")?,
        ai_confidence_score: score_from_i64(row.try_get("ai_confidence_score")?),
        similarity_score: score_from_i64(row.try_get("similarity_score")?),
        checks: serde_json::from_str::<Checks>(&checks).context("decoding checks")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: opt_from_ms(row.try_get("reviewed_at")?)?,
        review_notes: row.try_get("review_notes")?,
        created_at: from_ms(row.try_get("created_at")?)?,
    })
}

fn score_from_i64(v: i64) -> u8 {
    v.clamp(0, 100) as u8
}

/// Decodes everything except `type`, which the caller has already parsed.
fn row_to_job(row: &SqliteRow, kind: JobKind) -> Result<Job> {
    let payload: String = row.try_get("payload")?;
    let status: String = row.try_get("status")?;
    Ok(Job {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        kind,
        status: status.parse()?,
        payload: serde_json::from_str(&payload).context("decoding job payload")?,
        attempts: u32::try_from(row.try_get::<i64, _>("attempts")?).unwrap_or(0),
        max_attempts: u32::try_from(row.try_get::<i64, _>("max_attempts")?)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        last_error: row.try_get("last_error")?,
        scheduled_for: opt_from_ms(row.try_get("scheduled_for")?)?,
        started_at: opt_from_ms(row.try_get("started_at")?)?,
        completed_at: opt_from_ms(row.try_get("completed_at")?)?,
        created_at: from_ms(row.try_get("created_at")?)?,
    })
}

fn decode_job(row: &SqliteRow) -> Result<Job> {
    let raw_type: String = row.try_get("type")?;
    let kind: JobKind = raw_type.parse()?;
    row_to_job(row, kind)
}

// ------------------------------------------------------------
// JobStore
// ------------------------------------------------------------

#[async_trait]
impl JobStore for SqliteStore {
    async fn enqueue(
        &self,
        kind: JobKind,
        payload: JobPayload,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Job> {
        let job = Job::new(kind, payload, scheduled_for, self.max_attempts);
        sqlx::query(
            r#"
            INSERT INTO jobs (id, type, status, payload, attempts, max_attempts, scheduled_for, created_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(serde_json::to_string(&job.payload)?)
        .bind(i64::from(job.max_attempts))
        .bind(job.scheduled_for.map(to_ms))
        .bind(to_ms(job.created_at))
        .execute(&self.pool)
        .await?;
        Ok(job)
    }

    async fn claim_pending(
        &self,
        kind: Option<JobKind>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE status = 'pending'
              AND (scheduled_for IS NULL OR scheduled_for <= ?)
              AND (? IS NULL OR type = ?)
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(to_ms(now))
        .bind(kind.map(|k| k.as_str()))
        .bind(kind.map(|k| k.as_str()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_job(row) {
                Ok(job) => out.push(job),
                Err(e) => {
                    let id: String = row.try_get("id")?;
                    self.fail_undecodable_job(&id, &format!("{e:#}")).await?;
                }
            }
        }
        Ok(out)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        let res = sqlx::query("UPDATE jobs SET status = 'processing', started_at = ? WHERE id = ?")
            .bind(to_ms(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("job {id} not found");
        }
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        let res = sqlx::query("UPDATE jobs SET status = 'completed', completed_at = ? WHERE id = ?")
            .bind(to_ms(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("job {id} not found");
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Job> {
        let mut job = self
            .get_job(id)
            .await?
            .ok_or_else(|| anyhow!("job {id} not found"))?;
        job.record_failure(error, Utc::now());

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, attempts = ?, last_error = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(i64::from(job.attempts))
        .bind(job.last_error.as_deref())
        .bind(job.completed_at.map(to_ms))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_job).transpose()
    }

    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE (? IS NULL OR status = ?)
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_job(row) {
                Ok(job) => out.push(job),
                Err(e) => warn!(error = %e, "skipping undecodable job row"),
            }
        }
        Ok(out)
    }

    async fn has_open_job(&self, kind: JobKind, payload: &JobPayload) -> Result<bool> {
        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE type = ? AND payload = ? AND status IN ('pending', 'processing')
            "#,
        )
        .bind(kind.as_str())
        .bind(serde_json::to_string(payload)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(n > 0)
    }

    async fn job_counts(&self) -> Result<JobCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = JobCounts::default();
        for row in &rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            counts.add(status.parse()?, u64::try_from(n).unwrap_or(0));
        }
        Ok(counts)
    }

    async fn reset_processing(&self) -> Result<usize> {
        let res = sqlx::query(
            "UPDATE jobs SET status = 'pending', started_at = NULL WHERE status = 'processing'",
        )
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() as usize)
    }

    async fn count_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE status IN ('completed', 'failed') AND created_at < ?",
        )
        .bind(to_ms(cutoff))
        .fetch_one(&self.pool)
        .await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

// ------------------------------------------------------------
// SourceRegistry
// ------------------------------------------------------------

#[async_trait]
impl SourceRegistry for SqliteStore {
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_source).transpose()
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY domain")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_source).collect()
    }

    async fn upsert_source(&self, source: Source) -> Result<Source> {
        sqlx::query(
            r#"
            INSERT INTO sources (id, name, domain, feed_url, category, active, rate_limit_per_hour, last_fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(domain) DO UPDATE SET
                name = excluded.name,
                feed_url = excluded.feed_url,
                category = excluded.category,
                active = excluded.active,
                rate_limit_per_hour = excluded.rate_limit_per_hour
            "#,
        )
        .bind(source.id.to_string())
        .bind(&source.name)
        .bind(&source.domain)
        .bind(source.feed_url.as_deref())
        .bind(&source.category)
        .bind(i64::from(source.active))
        .bind(i64::from(source.rate_limit_per_hour))
        .bind(source.last_fetched_at.map(to_ms))
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM sources WHERE domain = ?")
            .bind(&source.domain)
            .fetch_one(&self.pool)
            .await?;
        row_to_source(&row)
    }

    async fn record_fetch(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let res = sqlx::query("UPDATE sources SET last_fetched_at = ? WHERE id = ?")
            .bind(to_ms(at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("source {id} not found");
        }
        Ok(())
    }
}

// ------------------------------------------------------------
// ContentStore
// ------------------------------------------------------------

#[async_trait]
impl ContentStore for SqliteStore {
    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    async fn insert_article(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
                (id, url, title, slug, source_id, published_at, fetched_at, raw_text, authors, category, status, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.id.to_string())
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.slug)
        .bind(article.source_id.map(|id| id.to_string()))
        .bind(to_ms(article.published_at))
        .bind(to_ms(article.fetched_at))
        .bind(article.raw_text.as_deref())
        .bind(serde_json::to_string(&article.authors)?)
        .bind(&article.category)
        .bind(article.status.as_str())
        .bind(serde_json::to_string(&article.metadata)?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("inserting article {}", article.url))?;
        Ok(())
    }

    async fn store_raw_text(&self, id: Uuid, raw_text: &str) -> Result<()> {
        let res = sqlx::query("UPDATE articles SET raw_text = ?, status = 'extracted' WHERE id = ?")
            .bind(raw_text)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("article {id} not found");
        }
        Ok(())
    }

    async fn set_article_status(&self, id: Uuid, status: ArticleStatus) -> Result<()> {
        let res = sqlx::query("UPDATE articles SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("article {id} not found");
        }
        Ok(())
    }

    async fn mark_article_failed(&self, id: Uuid, metadata: Map<String, Value>) -> Result<()> {
        let mut article = self
            .get_article(id)
            .await?
            .ok_or_else(|| anyhow!("article {id} not found"))?;
        article.metadata.extend(metadata);

        sqlx::query(
            "UPDATE articles SET status = 'failed', raw_text = NULL, metadata = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(&article.metadata)?)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_raw_text(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let res = sqlx::query(
            "UPDATE articles SET raw_text = NULL WHERE raw_text IS NOT NULL AND fetched_at < ?",
        )
        .bind(to_ms(cutoff))
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() as usize)
    }

    async fn save_report(&self, report: &Report) -> Result<Report> {
        sqlx::query(
            r#"
            INSERT INTO reports
                (id, article_id, tldr, bullets, rendered_body, plain_body, entities,
                 ai_confidence_score, similarity_score, checks, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(article_id) DO UPDATE SET
                tldr = excluded.tldr,
                bullets = excluded.bullets,
                rendered_body = excluded.rendered_body,
                plain_body = excluded.plain_body,
                entities = excluded.entities,
                ai_confidence_score = excluded.ai_confidence_score,
                similarity_score = excluded.similarity_score,
                checks = excluded.checks
            "#,
        )
        .bind(report.id.to_string())
        .bind(report.article_id.to_string())
        .bind(&report.tldr)
        .bind(serde_json::to_string(&report.bullets)?)
        .bind(&report.rendered_body)
        .bind(&report.plain_body)
        .bind(serde_json::to_string(&report.entities)?)
        .bind(i64::from(report.ai_confidence_score))
        .bind(i64::from(report.similarity_score))
        .bind(serde_json::to_string(&report.checks)?)
        .bind(to_ms(report.created_at))
        .execute(&self.pool)
        .await?;

        self.get_report_for_article(report.article_id)
            .await?
            .ok_or_else(|| anyhow!("report for article {} vanished after save", report.article_id))
    }

    async fn get_report_for_article(&self, article_id: Uuid) -> Result<Option<Report>> {
        let row = sqlx::query("SELECT * FROM reports WHERE article_id = ?")
            .bind(article_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_report).transpose()
    }

    async fn update_report_checks(&self, report_id: Uuid, checks: &Checks) -> Result<()> {
        let res = sqlx::query("UPDATE reports SET checks = ? WHERE id = ?")
            .bind(serde_json::to_string(checks)?)
            .bind(report_id.to_string())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            anyhow::bail!("report {report_id} not found");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_is_derived_from_url() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("nested/dir/pipeline.db");
        let url = format!("sqlite://{}?mode=rwc", db.display());
        ensure_parent_dir(&url).unwrap();
        assert!(tmp.path().join("nested/dir").is_dir());
    }

    #[test]
    fn scores_are_clamped() {
        assert_eq!(score_from_i64(-3), 0);
        assert_eq!(score_from_i64(250), 100);
        assert_eq!(score_from_i64(42), 42);
    }
}
