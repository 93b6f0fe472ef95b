// tests/common/mod.rs
// Shared stubs for the integration tests. Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Map;
use uuid::Uuid;

use article_pipeline::analyze::{
    AiCapabilities, GeneratedContent, GenerationRequest, LexicalSimilarity, SimilarityScorer,
    TextGenerator, Verifier,
};
use article_pipeline::http::{HttpError, HttpFetcher};
use article_pipeline::model::Entities;
use article_pipeline::stages::{StageLimits, Stages};
use article_pipeline::store::{JobStore, MemoryStore, Stores};
use article_pipeline::{Article, ArticleStatus, FactCheck, Source};

pub const FEED_URL: &str = "https://news.example.com/rss";
pub const RSS_FIXTURE: &str = include_str!("../fixtures/feed_rss.xml");
pub const ARTICLE_HTML: &str = include_str!("../fixtures/article.html");
pub const SHORT_HTML: &str = include_str!("../fixtures/short.html");

// ------------------------------------------------------------
// HTTP
// ------------------------------------------------------------

/// Serves canned bodies by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct StubHttp {
    bodies: Mutex<HashMap<String, String>>,
    pub feed_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
}

impl StubHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, body: &str) -> Self {
        self.set(url, body);
        self
    }

    pub fn set(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    fn get(&self, url: &str) -> Result<String, HttpError> {
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| HttpError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[async_trait]
impl HttpFetcher for StubHttp {
    async fn fetch_feed(&self, url: &str) -> Result<String, HttpError> {
        self.feed_calls.fetch_add(1, Ordering::SeqCst);
        self.get(url)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, HttpError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.get(url)
    }
}

// ------------------------------------------------------------
// AI capabilities
// ------------------------------------------------------------

#[derive(Clone)]
pub enum GenMode {
    Complete,
    NoPayload,
    Missing(&'static str),
    Outage,
}

pub struct StubGenerator {
    pub mode: Mutex<GenMode>,
    pub calls: AtomicUsize,
}

impl StubGenerator {
    pub fn new(mode: GenMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn complete_content() -> GeneratedContent {
    GeneratedContent {
        tldr: "The council approved the bridge budget. Work starts in October.".into(),
        bullets: vec![
            "Budget is 12 million euro".into(),
            "Vote passed seven to two".into(),
            "Construction starts in October".into(),
            "Opponents asked for a review".into(),
        ],
        rendered_body: "<p onclick=\"x()\">The council approved the budget.</p><script>alert(1)</script>".into(),
        plain_body: "The council approved the budget.".into(),
        entities: Some(Entities {
            persons: vec!["Ana Lopez".into(), "Tom Hale".into()],
            orgs: vec!["City Council".into()],
            places: vec![],
        }),
        confidence: Some(87.0),
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _req: &GenerationRequest) -> anyhow::Result<Option<GeneratedContent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            GenMode::Complete => Ok(Some(complete_content())),
            GenMode::NoPayload => Ok(None),
            GenMode::Missing(field) => {
                let mut c = complete_content();
                match field {
                    "tldr" => c.tldr.clear(),
                    "bullets" => c.bullets.clear(),
                    "entities" => c.entities = None,
                    "confidence" => c.confidence = None,
                    "plainBody" => c.plain_body.clear(),
                    _ => c.rendered_body.clear(),
                }
                Ok(Some(c))
            }
            GenMode::Outage => bail!("provider unavailable"),
        }
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

pub struct StubVerifier {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StubVerifier {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Verifier for StubVerifier {
    async fn verify(&self, _original: &str, _derived: &str) -> anyhow::Result<Vec<FactCheck>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("verification provider threw");
        }
        Ok(vec![FactCheck {
            claim: "Budget is 12 million euro".into(),
            verified: true,
            confidence: 92,
        }])
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}

pub struct FailingSimilarity;

#[async_trait]
impl SimilarityScorer for FailingSimilarity {
    async fn score(&self, _a: &str, _b: &str) -> anyhow::Result<u8> {
        bail!("similarity backend down")
    }
}

// ------------------------------------------------------------
// Harness
// ------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub http: Arc<StubHttp>,
    pub generator: Arc<StubGenerator>,
    pub verifier: Arc<StubVerifier>,
    pub stages: Arc<Stages>,
}

pub struct HarnessBuilder {
    store: Arc<MemoryStore>,
    http: StubHttp,
    generator: StubGenerator,
    verifier: StubVerifier,
    similarity: Arc<dyn SimilarityScorer>,
    limits: StageLimits,
    jobs: Option<Arc<dyn JobStore>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            http: StubHttp::new(),
            generator: StubGenerator::new(GenMode::Complete),
            verifier: StubVerifier::ok(),
            similarity: Arc::new(LexicalSimilarity::default()),
            limits: StageLimits::default(),
            jobs: None,
        }
    }

    /// Route job operations through `jobs` instead of the memory store.
    pub fn jobs(mut self, jobs: Arc<dyn JobStore>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn http(mut self, http: StubHttp) -> Self {
        self.http = http;
        self
    }

    pub fn generator(mut self, mode: GenMode) -> Self {
        self.generator = StubGenerator::new(mode);
        self
    }

    pub fn verifier(mut self, verifier: StubVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn similarity(mut self, s: Arc<dyn SimilarityScorer>) -> Self {
        self.similarity = s;
        self
    }

    pub fn build(self) -> Harness {
        let http = Arc::new(self.http);
        let generator = Arc::new(self.generator);
        let verifier = Arc::new(self.verifier);
        let mut stores = Stores::from_backend(self.store.clone());
        if let Some(jobs) = self.jobs {
            stores.jobs = jobs;
        }
        let stages = Stages::new(
            stores,
            http.clone(),
            AiCapabilities {
                generator: generator.clone(),
                verifier: verifier.clone(),
            },
            self.similarity,
            self.limits,
        );
        Harness {
            store: self.store,
            http,
            generator,
            verifier,
            stages: Arc::new(stages),
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}

pub fn feed_source() -> Source {
    let mut s = Source::new("Example Daily", "news.example.com", Some(FEED_URL.to_string()));
    s.category = "local".into();
    s.rate_limit_per_hour = 60;
    s
}

pub fn article(url: &str, status: ArticleStatus, raw_text: Option<&str>) -> Article {
    let now = Utc::now();
    Article {
        id: Uuid::new_v4(),
        url: url.to_string(),
        title: "Council approves river bridge budget".into(),
        slug: format!("council-approves-river-bridge-budget-{}", Uuid::new_v4().simple()),
        source_id: None,
        published_at: now,
        fetched_at: now,
        raw_text: raw_text.map(str::to_string),
        authors: vec![],
        category: "local".into(),
        status,
        metadata: Map::new(),
    }
}

pub const RAW_TEXT: &str = "The city council on Monday approved a 12 million euro budget to rebuild the river bridge. \"We will rebuild the bridge before winter,\" said Mayor Ana Lopez. Councillor Tom Hale said the plan \"moves too fast for a project of this size\".";
