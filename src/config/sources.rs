// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{Source, DEFAULT_RATE_LIMIT_PER_HOUR};

pub const ENV_SOURCES_PATH: &str = "PIPELINE_SOURCES_PATH";

/// One configured source as written in the seed file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceSeed {
    pub name: String,
    pub domain: String,
    #[serde(default, alias = "feedUrl")]
    pub feed_url: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "default_rate", alias = "rateLimitPerHour")]
    pub rate_limit_per_hour: u32,
}

fn default_category() -> String {
    "general".to_string()
}
fn default_active() -> bool {
    true
}
fn default_rate() -> u32 {
    DEFAULT_RATE_LIMIT_PER_HOUR
}

impl SourceSeed {
    pub fn into_source(self) -> Source {
        let mut s = Source::new(self.name, self.domain, self.feed_url);
        s.category = self.category;
        s.active = self.active;
        s.rate_limit_per_hour = self.rate_limit_per_hour.max(1);
        s
    }
}

/// Load seeds from an explicit path. Supports TOML (`[[source]]` tables) or a JSON array.
pub fn load_seed_sources_from(path: &Path) -> Result<Vec<SourceSeed>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load seeds using env var + fallbacks:
/// 1) $PIPELINE_SOURCES_PATH
/// 2) `configured` (from PipelineConfig::sources_path)
/// 3) same stem with .json
///
/// Nothing found means nothing to seed.
pub fn load_seed_sources(configured: &Path) -> Result<Vec<SourceSeed>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_seed_sources_from(&pb);
        } else {
            return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
        }
    }
    if configured.exists() {
        return load_seed_sources_from(configured);
    }
    let json_p = configured.with_extension("json");
    if json_p.exists() {
        return load_seed_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceSeed>> {
    let try_toml = hint_ext == "toml" || s.contains("[[source]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<SourceSeed>> {
    #[derive(Deserialize)]
    struct TomlSources {
        #[serde(default)]
        source: Vec<SourceSeed>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.source))
}

fn parse_json(s: &str) -> Result<Vec<SourceSeed>> {
    let v: Vec<SourceSeed> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop entries without a domain, last entry wins per domain.
fn clean_list(items: Vec<SourceSeed>) -> Vec<SourceSeed> {
    let mut by_domain = BTreeMap::new();
    for mut it in items {
        it.name = it.name.trim().to_string();
        it.domain = it.domain.trim().to_ascii_lowercase();
        it.feed_url = it
            .feed_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if it.domain.is_empty() {
            continue;
        }
        by_domain.insert(it.domain.clone(), it);
    }
    by_domain.into_values().collect()
}
