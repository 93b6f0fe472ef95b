// src/stages/fact_check.rs
use tracing::{info, warn};
use uuid::Uuid;

use super::Stages;
use crate::analyze::{extract_quotes, truncate_chars};
use crate::error::{StageError, StageResult};
use crate::html::to_plain_text;
use crate::model::{ArticleStatus, Checks};

impl Stages {
    /// Attach verification results and locally extracted quotes to the report.
    /// A failing verifier yields no fact checks instead of failing the job.
    /// Last automated stage; publication is decided outside the pipeline.
    pub async fn fact_check(&self, article_id: Uuid) -> StageResult<Checks> {
        let article = self
            .stores
            .content
            .get_article(article_id)
            .await?
            .ok_or(StageError::ArticleNotFound(article_id))?;
        if article.status != ArticleStatus::Humanized {
            return Err(StageError::UnexpectedStatus {
                id: article_id,
                actual: article.status,
                expected: "humanized",
            });
        }
        let report = self
            .stores
            .content
            .get_report_for_article(article_id)
            .await?
            .ok_or(StageError::ReportNotFound(article_id))?;
        let raw_text = match article.raw_text.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(StageError::MissingRawText(article_id)),
        };

        let derived = if report.plain_body.trim().is_empty() {
            to_plain_text(&report.rendered_body)
        } else {
            report.plain_body.clone()
        };

        let limit = self.limits.verification_char_limit;
        let (original, _) = truncate_chars(raw_text, limit);
        let (derived, _) = truncate_chars(&derived, limit);

        let fact_checks = match self.ai.verifier.verify(original, derived).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = ?e, %article_id, "verification unavailable, continuing without fact checks");
                crate::metrics::degraded("verification");
                Vec::new()
            }
        };
        let quoted_texts = extract_quotes(raw_text, self.limits.max_quotes);

        let checks = Checks {
            fact_checks,
            quoted_texts,
        };
        self.stores
            .content
            .update_report_checks(report.id, &checks)
            .await?;

        info!(
            target: "fact_check",
            %article_id,
            report_id = %report.id,
            claims = checks.fact_checks.len(),
            verified = checks.fact_checks.iter().filter(|c| c.verified).count(),
            quotes = checks.quoted_texts.len(),
            "checks attached"
        );
        Ok(checks)
    }
}
