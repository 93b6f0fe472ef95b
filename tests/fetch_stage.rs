// tests/fetch_stage.rs
mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};
use uuid::Uuid;

use article_pipeline::store::{ContentStore, SourceRegistry};
use article_pipeline::{ArticleStatus, JobKind, StageError};
use common::{article, feed_source, HarnessBuilder, StubHttp, FEED_URL, RSS_FIXTURE};

#[tokio::test]
async fn new_entries_become_fetched_articles_with_extract_jobs() {
    let h = HarnessBuilder::new()
        .http(StubHttp::new().with(FEED_URL, RSS_FIXTURE))
        .build();
    let source = h.store.upsert_source(feed_source()).await.unwrap();

    let before = Utc::now();
    let summary = h.stages.fetch(source.id).await.unwrap();
    assert_eq!(summary.entries, 2);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.skipped, 0);

    let mut articles = h.store.articles().unwrap();
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    assert_eq!(articles[0].url, "https://news.example.com/a");
    assert_eq!(articles[0].status, ArticleStatus::Fetched);
    assert_eq!(articles[0].category, "local");
    assert_eq!(articles[0].source_id, Some(source.id));
    assert_eq!(articles[0].authors, vec!["Jane Roe".to_string()]);
    assert!(articles[0].raw_text.is_none());
    assert!(articles[0].slug.starts_with("council-approves-river-bridge-budget-"));

    let jobs = h.store.jobs().unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.kind == JobKind::Extract));
    let queued: HashSet<Uuid> = jobs.iter().filter_map(|j| j.payload.article_id).collect();
    let created: HashSet<Uuid> = articles.iter().map(|a| a.id).collect();
    assert_eq!(queued, created);

    let polled = h.store.get_source(source.id).await.unwrap().unwrap();
    assert!(polled.last_fetched_at.unwrap() >= before);
}

#[tokio::test]
async fn known_url_creates_nothing_but_still_stamps_the_source() {
    let feed = r#"<rss><channel><item><title>Again</title><link>https://x.com/a</link></item></channel></rss>"#;
    let h = HarnessBuilder::new()
        .http(StubHttp::new().with(FEED_URL, feed))
        .build();
    let mut s = feed_source();
    let stale = Utc::now() - Duration::hours(2);
    s.last_fetched_at = Some(stale);
    let source = h.store.upsert_source(s).await.unwrap();
    h.store
        .insert_article(&article("https://x.com/a", ArticleStatus::Extracted, Some("text")))
        .await
        .unwrap();

    let summary = h.stages.fetch(source.id).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(h.store.articles().unwrap().len(), 1);
    assert!(h.store.jobs().unwrap().is_empty());

    let polled = h.store.get_source(source.id).await.unwrap().unwrap();
    assert!(polled.last_fetched_at.unwrap() > stale);
}

#[tokio::test]
async fn repeated_runs_are_idempotent_by_url() {
    let h = HarnessBuilder::new()
        .http(StubHttp::new().with(FEED_URL, RSS_FIXTURE))
        .build();
    let source = h.store.upsert_source(feed_source()).await.unwrap();

    h.stages.fetch(source.id).await.unwrap();
    let second = h.stages.fetch(source.id).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(h.store.articles().unwrap().len(), 2);
    assert_eq!(h.http.feed_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn identical_titles_get_distinct_slugs() {
    let feed = r#"<rss><channel>
        <item><title>Same headline</title><link>https://x.com/1</link></item>
        <item><title>Same headline</title><link>https://x.com/2</link></item>
        <item><title>Same headline</title><link>https://x.com/3</link></item>
    </channel></rss>"#;
    let h = HarnessBuilder::new()
        .http(StubHttp::new().with(FEED_URL, feed))
        .build();
    let source = h.store.upsert_source(feed_source()).await.unwrap();

    let summary = h.stages.fetch(source.id).await.unwrap();
    assert_eq!(summary.created, 3);
    let slugs: HashSet<String> = h.store.articles().unwrap().into_iter().map(|a| a.slug).collect();
    assert_eq!(slugs.len(), 3);
    assert!(slugs.iter().all(|s| s.starts_with("same-headline-")));
}

#[tokio::test]
async fn missing_source_and_feedless_source_fail() {
    let h = HarnessBuilder::new().build();
    let err = h.stages.fetch(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StageError::SourceNotFound(_)));

    let feedless = h
        .store
        .upsert_source(article_pipeline::Source::new("No feed", "nofeed.example", None))
        .await
        .unwrap();
    let err = h.stages.fetch(feedless.id).await.unwrap_err();
    assert!(matches!(err, StageError::SourceWithoutFeed(_)));
}

#[tokio::test]
async fn network_and_parse_errors_leave_the_source_unstamped() {
    let h = HarnessBuilder::new().build();
    let source = h.store.upsert_source(feed_source()).await.unwrap();

    let err = h.stages.fetch(source.id).await.unwrap_err();
    assert!(err.to_string().contains("404"));

    h.http.set(FEED_URL, "<html>not a feed</html>");
    let err = h.stages.fetch(source.id).await.unwrap_err();
    assert!(matches!(err, StageError::FeedParse(_)));

    let polled = h.store.get_source(source.id).await.unwrap().unwrap();
    assert!(polled.last_fetched_at.is_none());
}
