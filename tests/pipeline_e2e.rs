// tests/pipeline_e2e.rs
mod common;

use std::sync::Arc;

use chrono::Utc;

use article_pipeline::analyze::{AiCapabilities, LexicalSimilarity};
use article_pipeline::config::{PipelineConfig, SourceSeed};
use article_pipeline::store::{ContentStore, JobStore, MemoryStore, SourceRegistry, Stores};
use article_pipeline::{ArticleStatus, Pipeline};
use common::{GenMode, StubGenerator, StubHttp, StubVerifier, ARTICLE_HTML, FEED_URL, RSS_FIXTURE};

fn seed() -> SourceSeed {
    SourceSeed {
        name: "Example Daily".into(),
        domain: "news.example.com".into(),
        feed_url: Some(FEED_URL.into()),
        category: "local".into(),
        active: true,
        rate_limit_per_hour: 4,
    }
}

#[tokio::test]
async fn feed_entry_travels_to_a_checked_report() {
    let store = Arc::new(MemoryStore::new());
    let http = StubHttp::new()
        .with(FEED_URL, RSS_FIXTURE)
        .with("https://news.example.com/a", ARTICLE_HTML)
        .with("https://news.example.com/b", ARTICLE_HTML);
    let pipeline = Pipeline::new(
        Stores::from_backend(store.clone()),
        Arc::new(http),
        AiCapabilities {
            generator: Arc::new(StubGenerator::new(GenMode::Complete)),
            verifier: Arc::new(StubVerifier::ok()),
        },
        Arc::new(LexicalSimilarity::default()),
        &PipelineConfig::default(),
    );

    assert_eq!(pipeline.seed_sources(vec![seed(), seed()]).await.unwrap(), 2);
    assert_eq!(store.list_sources().await.unwrap().len(), 1);

    let scheduled = pipeline
        .scheduler()
        .enqueue_due_fetches(Utc::now())
        .await
        .unwrap();
    assert_eq!(scheduled.enqueued, 1);

    let dispatcher = pipeline.dispatcher();
    let mut cycles = 0;
    while dispatcher.run_cycle(Utc::now()).await.unwrap().claimed > 0 {
        cycles += 1;
        assert!(cycles < 10, "queue never drained");
    }
    // fetch, extract x2, humanize x2, fact-check x2
    assert_eq!(cycles, 4);

    let counts = store.job_counts().await.unwrap();
    assert_eq!(counts.completed, 7);
    assert_eq!(counts.failed, 0);

    for a in store.articles().unwrap() {
        assert_eq!(a.status, ArticleStatus::Humanized);
        let report = store.get_report_for_article(a.id).await.unwrap().unwrap();
        assert_eq!(report.checks.fact_checks.len(), 1);
        assert!(report.reviewed_by.is_none());
    }

    // The source was just polled, so the next pass has nothing to do.
    let again = pipeline
        .scheduler()
        .enqueue_due_fetches(Utc::now())
        .await
        .unwrap();
    assert_eq!(again.enqueued, 0);
    assert_eq!(again.rate_limited, 1);
}

#[tokio::test]
async fn recover_puts_stranded_jobs_back() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(
        Stores::from_backend(store.clone()),
        Arc::new(StubHttp::new()),
        AiCapabilities {
            generator: Arc::new(StubGenerator::new(GenMode::Complete)),
            verifier: Arc::new(StubVerifier::ok()),
        },
        Arc::new(LexicalSimilarity::default()),
        &PipelineConfig::default(),
    );
    let job = store
        .enqueue(
            article_pipeline::JobKind::Fetch,
            Default::default(),
            None,
        )
        .await
        .unwrap();
    store.mark_processing(job.id).await.unwrap();

    assert_eq!(pipeline.recover().await.unwrap(), 1);
    assert_eq!(pipeline.recover().await.unwrap(), 0);
}
