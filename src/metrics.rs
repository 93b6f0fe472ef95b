// src/metrics.rs
//! Metric names and the optional Prometheus exporter.
//! Without an installed recorder every call below is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

use crate::model::JobKind;

pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_jobs_enqueued_total", "Jobs enqueued, by kind.");
        describe_counter!("pipeline_jobs_completed_total", "Jobs completed, by kind.");
        describe_counter!(
            "pipeline_jobs_failed_total",
            "Job attempts that failed, by kind and whether the job is now terminal."
        );
        describe_counter!(
            "pipeline_articles_created_total",
            "Articles created by the fetch stage."
        );
        describe_counter!(
            "pipeline_fetch_skipped_total",
            "Feed entries skipped because the URL already exists."
        );
        describe_counter!(
            "pipeline_degraded_total",
            "Capability calls that fell back to a default, by capability."
        );
        describe_histogram!("pipeline_stage_ms", "Stage execution time in milliseconds.");
        describe_histogram!("pipeline_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "pipeline_dispatcher_last_cycle_ts",
            "Unix ts of the last dispatcher cycle."
        );
    });
}

/// Install the Prometheus recorder with its own HTTP listener when
/// `METRICS_ADDR` is set. Returns the bound address, if any.
/// Must run inside a tokio runtime.
pub fn install_exporter_from_env() -> anyhow::Result<Option<SocketAddr>> {
    let Ok(raw) = std::env::var(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .trim()
        .parse()
        .with_context(|| format!("{ENV_METRICS_ADDR}={raw} is not a socket address"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    Ok(Some(addr))
}

pub(crate) fn job_enqueued(kind: JobKind) {
    counter!("pipeline_jobs_enqueued_total", "kind" => kind.as_str()).increment(1);
}

pub(crate) fn job_completed(kind: JobKind, elapsed: Duration) {
    counter!("pipeline_jobs_completed_total", "kind" => kind.as_str()).increment(1);
    stage_time(kind, elapsed);
}

pub(crate) fn job_failed(kind: JobKind, terminal: bool, elapsed: Duration) {
    let terminal = if terminal { "true" } else { "false" };
    counter!("pipeline_jobs_failed_total", "kind" => kind.as_str(), "terminal" => terminal)
        .increment(1);
    stage_time(kind, elapsed);
}

fn stage_time(kind: JobKind, elapsed: Duration) {
    histogram!("pipeline_stage_ms", "kind" => kind.as_str()).record(elapsed.as_secs_f64() * 1_000.0);
}

pub(crate) fn degraded(capability: &'static str) {
    counter!("pipeline_degraded_total", "capability" => capability).increment(1);
}

pub(crate) fn dispatcher_cycle(ts: i64) {
    gauge!("pipeline_dispatcher_last_cycle_ts").set(ts as f64);
}
