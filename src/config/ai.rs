// src/config/ai.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// Only "openai" (or any OpenAI-compatible endpoint via `base_url`) is wired.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading AI config from {}", path.display()))?;
        let mut cfg: AiConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", path.display()))?;

        cfg.provider = cfg.provider.trim().to_lowercase();

        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var(ENV_OPENAI_KEY)
                    .with_context(|| format!("api_key is \"ENV\" but {ENV_OPENAI_KEY} is unset"))?,
                other => anyhow::bail!("no key variable known for provider '{other}'"),
            };
        }

        cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();
        if cfg.timeout_secs == 0 {
            cfg.timeout_secs = default_timeout_secs();
        }

        Ok(cfg)
    }

    /// Missing file means AI disabled; an unreadable one is logged and also disables AI.
    pub fn load_or_disabled<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "AI config unusable, AI disabled");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved_and_url_trimmed() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("ai.json");
        fs::write(
            &p,
            r#"{"enabled": true, "provider": "OpenAI", "api_key": "ENV", "base_url": "http://localhost:8080/v1/"}"#,
        )
        .unwrap();

        env::set_var("OPENAI_API_KEY", "sk-test");
        let cfg = AiConfig::load_from_file(&p).unwrap();
        env::remove_var("OPENAI_API_KEY");

        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.base_url, "http://localhost:8080/v1");
        assert_eq!(cfg.model, "gpt-4o-mini");
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_key_is_an_error_but_loader_degrades() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("ai.json");
        fs::write(&p, r#"{"enabled": true, "api_key": "env"}"#).unwrap();
        env::remove_var("OPENAI_API_KEY");

        assert!(AiConfig::load_from_file(&p).is_err());
        assert!(!AiConfig::load_or_disabled(&p).enabled);
        assert!(!AiConfig::load_or_disabled(tmp.path().join("nope.json")).enabled);
    }
}
