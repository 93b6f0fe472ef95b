// src/lib.rs
// Public library surface for the worker binaries and integration tests.

pub mod analyze;
pub mod config;
pub mod error;
pub mod html;
pub mod http;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod stages;
pub mod store;
pub mod worker;

// ---- Re-exports for stable public API ----
pub use crate::error::{ErrorClass, StageError, StageResult};
pub use crate::model::{
    Article, ArticleStatus, Checks, FactCheck, Job, JobCounts, JobKind, JobPayload, JobStatus,
    Report, Source,
};
pub use crate::pipeline::{Pipeline, PipelineHandle};
pub use crate::store::{ContentStore, JobStore, SourceRegistry, Stores};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "article_pipeline=info,warn";

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call twice.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
