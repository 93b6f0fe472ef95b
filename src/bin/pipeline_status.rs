//! Read-only queue report: job totals per status plus the failed jobs and
//! their last error, for manual follow-up.

use anyhow::Context;
use article_pipeline::config::PipelineConfig;
use article_pipeline::store::{JobStore, SqliteStore};
use article_pipeline::JobStatus;

const FAILED_LIMIT: usize = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    article_pipeline::init_tracing();

    let cfg = PipelineConfig::load().context("loading pipeline config")?;
    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .context("opening store")?;

    let counts = store.job_counts().await?;
    println!(
        "jobs: pending={} processing={} completed={} failed={} total={}",
        counts.pending,
        counts.processing,
        counts.completed,
        counts.failed,
        counts.total()
    );

    let failed = store.list_jobs(Some(JobStatus::Failed), FAILED_LIMIT).await?;
    if failed.is_empty() {
        return Ok(());
    }
    println!("\nfailed jobs (newest {}):", failed.len());
    for job in failed {
        let target = job
            .payload
            .article_id
            .or(job.payload.source_id)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {:<10} {} attempts={}/{} error={}",
            job.id,
            job.kind.as_str(),
            target,
            job.attempts,
            job.max_attempts,
            job.last_error.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
