// src/stages/humanize.rs
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::Stages;
use crate::analyze::{truncate_chars, GenerationRequest};
use crate::error::{StageError, StageResult};
use crate::html::{sanitize_fragment, to_plain_text};
use crate::model::{ArticleStatus, Checks, JobKind, JobPayload, Report};

/// Used when the similarity capability fails; the score is advisory.
pub const DEFAULT_SIMILARITY: u8 = 50;

impl Stages {
    /// Generate the derived content for an extracted article and persist it as
    /// the article's report, with empty checks for the next stage to fill.
    /// An incomplete provider answer fails the job and writes nothing.
    pub async fn humanize(&self, article_id: Uuid) -> StageResult<Report> {
        let article = self
            .stores
            .content
            .get_article(article_id)
            .await?
            .ok_or(StageError::ArticleNotFound(article_id))?;

        let raw_text = match article.raw_text.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(StageError::MissingRawText(article_id)),
        };
        if article.status != ArticleStatus::Extracted {
            return Err(StageError::UnexpectedStatus {
                id: article_id,
                actual: article.status,
                expected: "extracted",
            });
        }

        let (text, truncated) = truncate_chars(raw_text, self.limits.generation_char_limit);
        let req = GenerationRequest {
            title: article.title.clone(),
            text: text.to_string(),
            source_url: article.url.clone(),
            truncated,
        };

        let content = self
            .ai
            .generator
            .generate(&req)
            .await
            .map_err(|e| StageError::Generation(format!("{e:#}")))?
            .ok_or_else(|| StageError::Generation("provider returned no payload".into()))?
            .normalized();

        if let Some(field) = content.missing_field() {
            return Err(StageError::IncompleteGeneration(field));
        }
        let rendered_body = sanitize_fragment(&content.rendered_body);
        if rendered_body.is_empty() {
            return Err(StageError::IncompleteGeneration("renderedBody"));
        }
        let plain_body = if content.plain_body.is_empty() {
            to_plain_text(&rendered_body)
        } else {
            content.plain_body.clone()
        };

        let similarity_score = match self.similarity.score(raw_text, &plain_body).await {
            Ok(score) => score.min(100),
            Err(e) => {
                warn!(error = ?e, %article_id, "similarity unavailable, using default");
                crate::metrics::degraded("similarity");
                DEFAULT_SIMILARITY
            }
        };

        let report = Report {
            id: Uuid::new_v4(),
            article_id,
            tldr: content.tldr.clone(),
            bullets: content.bullets.clone(),
            rendered_body,
            plain_body,
            entities: content.entities.clone().unwrap_or_default(),
            ai_confidence_score: content.confidence_score(),
            similarity_score,
            checks: Checks::default(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            created_at: Utc::now(),
        };
        let saved = self.stores.content.save_report(&report).await?;
        self.stores
            .content
            .set_article_status(article_id, ArticleStatus::Humanized)
            .await?;
        self.enqueue_next(JobKind::FactCheck, JobPayload::article(article_id))
            .await?;

        info!(
            target: "humanize",
            %article_id,
            report_id = %saved.id,
            provider = self.ai.generator.provider_name(),
            truncated,
            confidence = saved.ai_confidence_score,
            similarity = saved.similarity_score,
            "report generated"
        );
        Ok(saved)
    }
}
