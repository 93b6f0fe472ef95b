// src/config/pipeline.rs
//! Worker tunables. Every field has a default, so an empty or missing file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::DEFAULT_USER_AGENT;

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub database_url: String,

    // Scheduler
    pub scheduler_interval_secs: u64,
    pub scheduler_startup_delay_secs: u64,
    pub cleanup_interval_secs: u64,
    pub raw_text_retention_days: u32,
    pub job_retention_days: u32,

    // Dispatcher
    pub dispatcher_batch_size: usize,
    pub dispatcher_idle_secs: u64,
    pub dispatcher_error_backoff_secs: u64,
    pub max_attempts: u32,

    // Network
    pub http_timeout_secs: u64,
    pub user_agent: String,

    // Stage limits
    pub feed_entry_cap: usize,
    pub min_text_chars: usize,
    pub generation_char_limit: usize,
    pub verification_char_limit: usize,
    pub max_quotes: usize,

    pub sources_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/pipeline.db?mode=rwc".to_string(),
            scheduler_interval_secs: 30 * 60,
            scheduler_startup_delay_secs: 5,
            cleanup_interval_secs: 24 * 60 * 60,
            raw_text_retention_days: 7,
            job_retention_days: 30,
            dispatcher_batch_size: 10,
            dispatcher_idle_secs: 5,
            dispatcher_error_backoff_secs: 10,
            max_attempts: crate::model::DEFAULT_MAX_ATTEMPTS,
            http_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            feed_entry_cap: crate::ingest::feed::DEFAULT_ENTRY_CAP,
            min_text_chars: 200,
            generation_char_limit: 12_000,
            verification_char_limit: 8_000,
            max_quotes: 10,
            sources_path: PathBuf::from("config/sources.toml"),
        }
    }
}

impl PipelineConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let cfg: PipelineConfig =
            toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg)
    }

    /// Resolution order:
    /// 1) $PIPELINE_CONFIG_PATH (must exist)
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        cfg.clamp();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database_url = url.trim().to_string();
            }
        }
        if let Some(v) = env_number("SCHEDULER_INTERVAL_SECS") {
            self.scheduler_interval_secs = v;
        }
        if let Some(v) = env_number("DISPATCHER_BATCH_SIZE") {
            self.dispatcher_batch_size = v;
        }
        if let Some(v) = env_number("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v;
        }
    }

    /// Zero intervals would spin; zero batch/attempts would stall the queue.
    fn clamp(&mut self) {
        self.scheduler_interval_secs = self.scheduler_interval_secs.max(1);
        self.cleanup_interval_secs = self.cleanup_interval_secs.max(1);
        self.dispatcher_batch_size = self.dispatcher_batch_size.max(1);
        self.dispatcher_idle_secs = self.dispatcher_idle_secs.max(1);
        self.dispatcher_error_backoff_secs = self.dispatcher_error_backoff_secs.max(1);
        self.max_attempts = self.max_attempts.max(1);
        self.http_timeout_secs = self.http_timeout_secs.max(1);
        self.feed_entry_cap = self.feed_entry_cap.max(1);
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.scheduler_startup_delay_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_secs(self.dispatcher_idle_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.dispatcher_error_backoff_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn raw_text_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.raw_text_retention_days))
    }

    pub fn job_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.job_retention_days))
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid numeric override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_env() {
        for k in [
            ENV_CONFIG_PATH,
            "DATABASE_URL",
            "SCHEDULER_INTERVAL_SECS",
            "DISPATCHER_BATCH_SIZE",
            "HTTP_TIMEOUT_SECS",
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PipelineConfig = toml::from_str("dispatcher_batch_size = 3\nmin_text_chars = 50").unwrap();
        assert_eq!(cfg.dispatcher_batch_size, 3);
        assert_eq!(cfg.min_text_chars, 50);
        assert_eq!(cfg.scheduler_interval_secs, 1800);
        assert_eq!(cfg.max_quotes, 10);
    }

    #[serial_test::serial]
    #[test]
    fn env_path_then_overrides() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("pipeline.toml");
        fs::write(&p, "scheduler_interval_secs = 60\ndispatcher_idle_secs = 0").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("DISPATCHER_BATCH_SIZE", "25");
        env::set_var("HTTP_TIMEOUT_SECS", "soon");

        let cfg = PipelineConfig::load().unwrap();
        assert_eq!(cfg.scheduler_interval_secs, 60);
        assert_eq!(cfg.dispatcher_batch_size, 25);
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.dispatcher_idle_secs, 1);

        clear_env();
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_path_is_an_error() {
        clear_env();
        env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
        assert!(PipelineConfig::load().is_err());
        clear_env();
    }
}
