//! AI adapter: generation + verification capabilities behind traits, with an
//! OpenAI-compatible provider, a disabled client and a deterministic mock.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ai::AiConfig;
use crate::http::DEFAULT_USER_AGENT;
use crate::model::{Entities, FactCheck};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Input to the text-generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub title: String,
    pub text: String,
    pub source_url: String,
    /// `text` was cut to the provider-safe length.
    pub truncated: bool,
}

/// Structured derived content. Missing fields deserialize to empty values so
/// that `missing_field` can reject them explicitly.
///
/// `plain_body` is the one optional field: when absent it is derived from the
/// sanitized `rendered_body`. `entities` must be present but its lists may be
/// empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratedContent {
    pub tldr: String,
    pub bullets: Vec<String>,
    pub rendered_body: String,
    pub plain_body: String,
    pub entities: Option<Entities>,
    pub confidence: Option<f64>,
}

impl GeneratedContent {
    /// Trim and collapse whitespace, drop blank bullets and duplicate entities.
    pub fn normalized(mut self) -> Self {
        self.tldr = collapse_ws(&self.tldr);
        self.bullets = self
            .bullets
            .iter()
            .map(|b| collapse_ws(b))
            .filter(|b| !b.is_empty())
            .collect();
        self.rendered_body = self.rendered_body.trim().to_string();
        self.plain_body = self.plain_body.trim().to_string();
        if let Some(entities) = self.entities.as_mut() {
            for list in [
                &mut entities.persons,
                &mut entities.orgs,
                &mut entities.places,
            ] {
                let mut seen = std::collections::HashSet::new();
                list.retain(|e| !e.trim().is_empty() && seen.insert(e.trim().to_lowercase()));
            }
        }
        self
    }

    /// First required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.tldr.trim().is_empty() {
            Some("tldr")
        } else if self.bullets.iter().all(|b| b.trim().is_empty()) {
            Some("bullets")
        } else if self.rendered_body.trim().is_empty() {
            Some("renderedBody")
        } else if self.entities.is_none() {
            Some("entities")
        } else if !self.confidence.is_some_and(f64::is_finite) {
            Some("confidence")
        } else {
            None
        }
    }

    /// Confidence as an integer score in 0..=100. Fractions below 1 are read
    /// as 0..1 probabilities.
    pub fn confidence_score(&self) -> u8 {
        self.confidence.map_or(0, to_score)
    }
}

/// Text-generation capability. `Ok(None)` means the provider answered with no payload.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> anyhow::Result<Option<GeneratedContent>>;
    fn provider_name(&self) -> &'static str;
}

/// Verification capability: claim/verified/confidence tuples for derived text.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, original: &str, derived: &str) -> anyhow::Result<Vec<FactCheck>>;
    fn provider_name(&self) -> &'static str;
}

/// The pair of capabilities handed to the stages.
#[derive(Clone)]
pub struct AiCapabilities {
    pub generator: Arc<dyn TextGenerator>,
    pub verifier: Arc<dyn Verifier>,
}

/// Factory: build capabilities according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns the deterministic mock.
/// * Else if `config.enabled==false`, returns the disabled client.
/// * Else builds the real provider (OpenAI-compatible).
pub fn build_capabilities(config: &AiConfig) -> AiCapabilities {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = Arc::new(MockProvider);
        return AiCapabilities {
            generator: mock.clone(),
            verifier: mock,
        };
    }

    let disabled = || {
        let d = Arc::new(DisabledClient);
        AiCapabilities {
            generator: d.clone(),
            verifier: d,
        }
    };

    if !config.enabled {
        return disabled();
    }

    match config.provider.as_str() {
        "openai" => match OpenAiProvider::new(config) {
            Ok(p) => {
                let p = Arc::new(p);
                AiCapabilities {
                    generator: p.clone(),
                    verifier: p,
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, "AI provider could not be built, AI disabled");
                disabled()
            }
        },
        other => {
            tracing::warn!(provider = other, "unsupported AI provider, AI disabled");
            disabled()
        }
    }
}

// ------------------------------------------------------------
// OpenAI-compatible provider
// ------------------------------------------------------------

const GENERATION_PROMPT: &str = "You rewrite news articles for a digest. Use only facts present in the source text. \
Respond with a JSON object with keys: \
\"tldr\" (exactly 2 sentences), \
\"bullets\" (array of 4 to 8 short factual statements), \
\"renderedBody\" (HTML using only <p>, <ul>, <li>, <strong>, <em>; 150 to 400 words), \
\"plainBody\" (the same body as plain text), \
\"entities\" (object with arrays \"persons\", \"orgs\", \"places\"), \
\"confidence\" (integer 0-100: how well the source supports the rewrite).";

const VERIFICATION_PROMPT: &str = "You verify a derived summary against its original article. \
List the factual claims made in the derived text and check each against the original. \
Respond with a JSON object {\"claims\": [{\"claim\": string, \"verified\": boolean, \"confidence\": integer 0-100}]}.";

/// Chat Completions with `response_format = json_object`. Requires an API key.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        if cfg.api_key.trim().is_empty() {
            bail!("AI enabled but api_key is empty");
        }
        let http = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building AI http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
        })
    }

    async fn chat_json<T: DeserializeOwned>(&self, system: &str, user: &str) -> anyhow::Result<Option<T>> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("AI request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("AI provider returned HTTP {}", status.as_u16());
        }
        let body: Resp = resp.json().await.context("decoding AI response")?;
        let Some(content) = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
        else {
            return Ok(None);
        };
        let parsed = serde_json::from_str(&content).context("AI content is not the requested JSON")?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    async fn generate(&self, req: &GenerationRequest) -> anyhow::Result<Option<GeneratedContent>> {
        let note = if req.truncated {
            "\nNote: the article text below was truncated.\n"
        } else {
            ""
        };
        let user = format!(
            "Title: {}\nSource: {}{}\n\n{}",
            req.title, req.source_url, note, req.text
        );
        self.chat_json::<GeneratedContent>(GENERATION_PROMPT, &user).await
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait]
impl Verifier for OpenAiProvider {
    async fn verify(&self, original: &str, derived: &str) -> anyhow::Result<Vec<FactCheck>> {
        #[derive(Deserialize)]
        struct Claims {
            #[serde(default)]
            claims: Vec<RawClaim>,
        }
        #[derive(Deserialize)]
        struct RawClaim {
            #[serde(default)]
            claim: String,
            #[serde(default)]
            verified: bool,
            #[serde(default)]
            confidence: f64,
        }

        let user = format!("ORIGINAL:\n{original}\n\nDERIVED:\n{derived}");
        let out = self.chat_json::<Claims>(VERIFICATION_PROMPT, &user).await?;
        Ok(out
            .map(|c| c.claims)
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !c.claim.trim().is_empty())
            .map(|c| FactCheck {
                claim: collapse_ws(&c.claim),
                verified: c.verified,
                confidence: to_score(c.confidence),
            })
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Used when AI is disabled: generation errors, verification yields nothing.
pub struct DisabledClient;

#[async_trait]
impl TextGenerator for DisabledClient {
    async fn generate(&self, _req: &GenerationRequest) -> anyhow::Result<Option<GeneratedContent>> {
        bail!("AI generation is disabled")
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

#[async_trait]
impl Verifier for DisabledClient {
    async fn verify(&self, _original: &str, _derived: &str) -> anyhow::Result<Vec<FactCheck>> {
        Ok(Vec::new())
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic offline provider for tests/local runs: builds the derived
/// content from the leading sentences of the input.
#[derive(Clone, Copy, Default)]
pub struct MockProvider;

#[async_trait]
impl TextGenerator for MockProvider {
    async fn generate(&self, req: &GenerationRequest) -> anyhow::Result<Option<GeneratedContent>> {
        let sentences = leading_sentences(&req.text, 6);
        let mut bullets: Vec<String> = sentences.iter().take(6).cloned().collect();
        if bullets.is_empty() {
            bullets.push(collapse_ws(&req.title));
        }
        let plain = bullets.join(" ");
        let rendered = bullets
            .iter()
            .map(|b| format!("<p>{}</p>", html_escape::encode_text(b)))
            .collect::<String>();
        Ok(Some(GeneratedContent {
            tldr: format!("{} (mock summary).", collapse_ws(&req.title).trim_end_matches('.')),
            bullets,
            rendered_body: rendered,
            plain_body: plain,
            entities: Some(Entities::default()),
            confidence: Some(50.0),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[async_trait]
impl Verifier for MockProvider {
    async fn verify(&self, original: &str, derived: &str) -> anyhow::Result<Vec<FactCheck>> {
        Ok(leading_sentences(derived, 3)
            .into_iter()
            .map(|s| {
                let verified = original.contains(s.trim_end_matches('.'));
                FactCheck {
                    claim: s,
                    verified,
                    confidence: if verified { 90 } else { 30 },
                }
            })
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Helpers
// ------------------------------------------------------------

fn collapse_ws(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn to_score(v: f64) -> u8 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    // 1 is a valid integer score, not a probability of 1.0.
    let scaled = if v < 1.0 { v * 100.0 } else { v };
    scaled.round().min(100.0) as u8
}

fn leading_sentences(text: &str, n: usize) -> Vec<String> {
    let flat = collapse_ws(text);
    flat.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() > 1)
        .take(n)
        .map(str::to_string)
        .collect()
}
