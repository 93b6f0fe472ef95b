//! Pipeline worker: binary entrypoint.
//! Opens the store, seeds sources, recovers interrupted jobs, then runs the
//! scheduler and dispatcher until Ctrl-C.
//!
//! See `README.md` for configuration.

use std::sync::Arc;

use anyhow::Context;
use article_pipeline::analyze::{build_capabilities, LexicalSimilarity};
use article_pipeline::config::{ai::DEFAULT_AI_CONFIG_PATH, load_seed_sources, AiConfig, PipelineConfig};
use article_pipeline::http::ReqwestFetcher;
use article_pipeline::store::{SqliteStore, Stores};
use article_pipeline::{init_tracing, metrics, Pipeline};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    match metrics::install_exporter_from_env() {
        Ok(Some(addr)) => info!(%addr, "prometheus exporter listening"),
        Ok(None) => {}
        Err(e) => warn!(error = ?e, "metrics exporter not installed"),
    }

    let cfg = PipelineConfig::load().context("loading pipeline config")?;
    let ai_cfg = AiConfig::load_or_disabled(DEFAULT_AI_CONFIG_PATH);
    info!(
        provider = %ai_cfg.provider,
        enabled = ai_cfg.enabled,
        key_len = ai_cfg.api_key.len(),
        "AI config loaded"
    );

    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .context("opening store")?
        .with_max_attempts(cfg.max_attempts);
    let stores = Stores::from_backend(Arc::new(store));

    let http = ReqwestFetcher::new(cfg.http_timeout(), &cfg.user_agent)?;
    let pipeline = Pipeline::new(
        stores,
        Arc::new(http),
        build_capabilities(&ai_cfg),
        Arc::new(LexicalSimilarity {
            char_limit: cfg.verification_char_limit,
        }),
        &cfg,
    );

    match load_seed_sources(&cfg.sources_path) {
        Ok(seeds) if !seeds.is_empty() => {
            let n = pipeline.seed_sources(seeds).await?;
            info!(seeded = n, "sources seeded");
        }
        Ok(_) => info!(path = %cfg.sources_path.display(), "no source seed file"),
        Err(e) => warn!(error = ?e, "source seed file unusable"),
    }
    pipeline.recover().await?;

    let handle = pipeline.spawn();
    info!("pipeline running; Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutdown requested");
    handle.shutdown().await;
    Ok(())
}
