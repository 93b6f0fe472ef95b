// src/stages/fetch.rs
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::Stages;
use crate::error::{StageError, StageResult};
use crate::ingest::feed::{parse_feed, FeedEntry};
use crate::ingest::slug::slug_candidate;
use crate::model::{Article, ArticleStatus, JobKind, JobPayload, Source};

const MAX_SLUG_BUMPS: u32 = 1_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Entries kept after parsing and capping.
    pub entries: usize,
    pub created: usize,
    /// Entries whose URL already exists.
    pub skipped: usize,
}

impl Stages {
    /// Poll one source: parse its feed, create articles for unseen URLs, queue
    /// their extraction, and stamp the source's `lastFetchedAt` (even when
    /// nothing was new). Articles created before an error stay in place.
    pub async fn fetch(&self, source_id: Uuid) -> StageResult<FetchSummary> {
        let source = self
            .stores
            .sources
            .get_source(source_id)
            .await?
            .ok_or(StageError::SourceNotFound(source_id))?;
        let feed_url = source
            .feed_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(StageError::SourceWithoutFeed(source_id))?;

        let now = Utc::now();
        let xml = self.http.fetch_feed(feed_url).await?;
        let entries = parse_feed(&xml, now, self.limits.feed_entry_cap)
            .map_err(|e| StageError::FeedParse(format!("{e:#}")))?;

        let mut summary = FetchSummary {
            entries: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            if self
                .stores
                .content
                .find_article_by_url(&entry.url)
                .await?
                .is_some()
            {
                summary.skipped += 1;
                counter!("pipeline_fetch_skipped_total").increment(1);
                continue;
            }

            let article = self.new_article(&source, entry, now).await?;
            self.stores.content.insert_article(&article).await?;
            summary.created += 1;
            counter!("pipeline_articles_created_total").increment(1);
            debug!(article_id = %article.id, url = %article.url, slug = %article.slug, "article created");

            self.enqueue_next(JobKind::Extract, JobPayload::article(article.id))
                .await?;
        }

        self.stores.sources.record_fetch(source.id, now).await?;

        info!(
            target: "fetch",
            source = %source.name,
            entries = summary.entries,
            created = summary.created,
            skipped = summary.skipped,
            "source polled"
        );
        Ok(summary)
    }

    async fn new_article(
        &self,
        source: &Source,
        entry: FeedEntry,
        now: DateTime<Utc>,
    ) -> StageResult<Article> {
        let slug = self.unique_slug(&entry.title, now).await?;

        let mut metadata = Map::new();
        metadata.insert("sourceName".into(), Value::String(source.name.clone()));
        if let Some(desc) = entry.description {
            metadata.insert("description".into(), Value::String(desc));
        }

        Ok(Article {
            id: Uuid::new_v4(),
            url: entry.url,
            title: entry.title,
            slug,
            source_id: Some(source.id),
            published_at: entry.published_at,
            fetched_at: now,
            raw_text: None,
            authors: entry.authors,
            category: source.category.clone(),
            status: ArticleStatus::Fetched,
            metadata,
        })
    }

    /// First free candidate; `bump` only moves when the time-based suffix collides.
    async fn unique_slug(&self, title: &str, now: DateTime<Utc>) -> StageResult<String> {
        for bump in 0..MAX_SLUG_BUMPS {
            let candidate = slug_candidate(title, now, bump);
            if !self.stores.content.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(anyhow!("no free slug for '{title}' after {MAX_SLUG_BUMPS} candidates").into())
    }
}
