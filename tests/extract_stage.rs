// tests/extract_stage.rs
mod common;

use chrono::Utc;

use article_pipeline::store::{ContentStore, JobStore, MemoryStore};
use article_pipeline::worker::{Dispatcher, DispatcherConfig};
use article_pipeline::{ArticleStatus, JobKind, JobPayload, JobStatus, StageError};
use common::{article, harness, HarnessBuilder, StubHttp, ARTICLE_HTML, SHORT_HTML};

const URL: &str = "https://news.example.com/a";

#[tokio::test]
async fn extracts_main_text_and_queues_humanize() {
    let h = HarnessBuilder::new()
        .http(StubHttp::new().with(URL, ARTICLE_HTML))
        .build();
    let a = article(URL, ArticleStatus::Fetched, None);
    h.store.insert_article(&a).await.unwrap();

    let chars = h.stages.extract(a.id).await.unwrap();
    assert!(chars >= 200);

    let saved = h.store.get_article(a.id).await.unwrap().unwrap();
    assert_eq!(saved.status, ArticleStatus::Extracted);
    let text = saved.raw_text.unwrap();
    assert!(text.starts_with("Council approves river bridge budget"));
    assert!(text.contains("October & finish"));
    assert!(!text.contains("Trending"));
    assert!(!text.contains("analytics"));
    assert!(!text.contains("Related:"));

    let jobs = h.store.jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].kind, JobKind::Humanize);
    assert_eq!(jobs[0].payload.article_id, Some(a.id));
}

#[tokio::test]
async fn short_page_marks_article_failed_with_metadata() {
    let h = HarnessBuilder::new()
        .http(StubHttp::new().with(URL, SHORT_HTML))
        .build();
    let a = article(URL, ArticleStatus::Fetched, None);
    h.store.insert_article(&a).await.unwrap();

    let err = h.stages.extract(a.id).await.unwrap_err();
    assert!(matches!(err, StageError::ContentTooShort { min: 200, .. }));

    let saved = h.store.get_article(a.id).await.unwrap().unwrap();
    assert_eq!(saved.status, ArticleStatus::Failed);
    assert!(saved.raw_text.is_none());
    assert_eq!(saved.metadata["extraction_attempts"], 1);
    assert!(saved.metadata["extraction_error"]
        .as_str()
        .unwrap()
        .contains("too short"));
    assert!(saved.metadata.contains_key("extraction_failed_at"));
    assert!(h.store.jobs().unwrap().is_empty());
}

#[tokio::test]
async fn retry_after_short_page_can_still_succeed() {
    let h = HarnessBuilder::new()
        .http(StubHttp::new().with(URL, SHORT_HTML))
        .build();
    let a = article(URL, ArticleStatus::Fetched, None);
    h.store.insert_article(&a).await.unwrap();

    assert!(h.stages.extract(a.id).await.is_err());
    h.http.set(URL, ARTICLE_HTML);
    h.stages.extract(a.id).await.unwrap();

    let saved = h.store.get_article(a.id).await.unwrap().unwrap();
    assert_eq!(saved.status, ArticleStatus::Extracted);
    assert!(saved.has_raw_text());
}

#[tokio::test]
async fn short_page_ends_failed_within_max_attempts() {
    let h = HarnessBuilder::new()
        .store(MemoryStore::new().with_max_attempts(3))
        .http(StubHttp::new().with(URL, SHORT_HTML))
        .build();
    let a = article(URL, ArticleStatus::Fetched, None);
    h.store.insert_article(&a).await.unwrap();
    let job = h
        .store
        .enqueue(JobKind::Extract, JobPayload::article(a.id), None)
        .await
        .unwrap();

    let dispatcher = Dispatcher::new(h.stages.clone(), DispatcherConfig::default());
    for _ in 0..job.max_attempts {
        dispatcher.run_cycle(Utc::now()).await.unwrap();
    }

    let job = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, job.max_attempts);
    assert!(job.last_error.unwrap().contains("too short"));

    let saved = h.store.get_article(a.id).await.unwrap().unwrap();
    assert_eq!(saved.status, ArticleStatus::Failed);
    assert_eq!(saved.metadata["extraction_attempts"], u64::from(job.max_attempts));

    // Terminal: further cycles leave it alone.
    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.claimed, 0);
}

#[tokio::test]
async fn wrong_status_or_missing_article_is_rejected() {
    let h = harness();
    let err = h.stages.extract(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StageError::ArticleNotFound(_)));

    let a = article(URL, ArticleStatus::Humanized, Some("already done"));
    h.store.insert_article(&a).await.unwrap();
    let err = h.stages.extract(a.id).await.unwrap_err();
    assert!(matches!(
        err,
        StageError::UnexpectedStatus {
            actual: ArticleStatus::Humanized,
            ..
        }
    ));
    // Precondition failures never touch the network.
    assert_eq!(h.http.page_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_2xx_page_is_transient_but_recorded_on_the_article() {
    let h = harness();
    let a = article(URL, ArticleStatus::Fetched, None);
    h.store.insert_article(&a).await.unwrap();

    let err = h.stages.extract(a.id).await.unwrap_err();
    assert_eq!(err.class(), article_pipeline::ErrorClass::Transient);
    let saved = h.store.get_article(a.id).await.unwrap().unwrap();
    assert_eq!(saved.status, ArticleStatus::Failed);
    assert_eq!(saved.metadata["extraction_attempts"], 1);
    assert!(saved.metadata["extraction_error"]
        .as_str()
        .unwrap()
        .contains("HTTP 404"));
    assert!(h.store.jobs().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_page_leaves_article_failed_after_last_retry() {
    let h = HarnessBuilder::new()
        .store(MemoryStore::new().with_max_attempts(3))
        .build();
    let a = article(URL, ArticleStatus::Fetched, None);
    h.store.insert_article(&a).await.unwrap();
    let job = h
        .store
        .enqueue(JobKind::Extract, JobPayload::article(a.id), None)
        .await
        .unwrap();

    let dispatcher = Dispatcher::new(h.stages.clone(), DispatcherConfig::default());
    for _ in 0..job.max_attempts {
        dispatcher.run_cycle(Utc::now()).await.unwrap();
    }

    let job = h.store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.last_error.unwrap().contains("HTTP 404"));

    let saved = h.store.get_article(a.id).await.unwrap().unwrap();
    assert_eq!(saved.status, ArticleStatus::Failed);
    assert_eq!(saved.metadata["extraction_attempts"], u64::from(job.max_attempts));
    assert!(saved.metadata["extraction_error"]
        .as_str()
        .unwrap()
        .contains("HTTP 404"));
    assert_eq!(
        h.http.page_calls.load(std::sync::atomic::Ordering::SeqCst),
        job.max_attempts as usize
    );
}
