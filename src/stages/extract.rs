// src/stages/extract.rs
use chrono::Utc;
use serde_json::{json, Map};
use tracing::{info, warn};
use uuid::Uuid;

use super::Stages;
use crate::error::{StageError, StageResult};
use crate::html::extract_text;
use crate::model::{Article, ArticleStatus, JobKind, JobPayload};

impl Stages {
    /// Download the article page and keep its main text. A page that cannot be
    /// downloaded, or yields too little text, marks the article `failed` and
    /// fails the job, so the retry budget still applies; a later attempt that
    /// succeeds moves the article on to `extracted`.
    ///
    /// Returns the extracted length in chars.
    pub async fn extract(&self, article_id: Uuid) -> StageResult<usize> {
        let article = self
            .stores
            .content
            .get_article(article_id)
            .await?
            .ok_or(StageError::ArticleNotFound(article_id))?;

        match article.status {
            ArticleStatus::Fetched | ArticleStatus::Failed => {}
            actual => {
                return Err(StageError::UnexpectedStatus {
                    id: article_id,
                    actual,
                    expected: "fetched",
                })
            }
        }

        let html = match self.http.fetch_page(&article.url).await {
            Ok(html) => html,
            Err(e) => return Err(self.record_extraction_failure(&article, e.into()).await),
        };
        let text = extract_text(&html);
        let chars = text.chars().count();

        if chars < self.limits.min_text_chars {
            let err = StageError::ContentTooShort {
                chars,
                min: self.limits.min_text_chars,
            };
            return Err(self.record_extraction_failure(&article, err).await);
        }

        self.stores.content.store_raw_text(article_id, &text).await?;
        self.enqueue_next(JobKind::Humanize, JobPayload::article(article_id))
            .await?;

        info!(target: "extract", %article_id, chars, "article extracted");
        Ok(chars)
    }

    /// Mark the article `failed` with the error and attempt count in its
    /// metadata. Returns the error to fail the job with; a store error wins.
    async fn record_extraction_failure(&self, article: &Article, err: StageError) -> StageError {
        let attempts = article
            .metadata
            .get("extraction_attempts")
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            + 1;

        let mut metadata = Map::new();
        metadata.insert("extraction_error".into(), json!(err.to_string()));
        metadata.insert("extraction_attempts".into(), json!(attempts));
        metadata.insert(
            "extraction_failed_at".into(),
            json!(Utc::now().to_rfc3339()),
        );
        if let Err(store_err) = self
            .stores
            .content
            .mark_article_failed(article.id, metadata)
            .await
        {
            return store_err.into();
        }

        warn!(
            target: "extract",
            article_id = %article.id,
            url = %article.url,
            attempts,
            error = %err,
            "extraction failed; article marked failed"
        );
        err
    }
}
