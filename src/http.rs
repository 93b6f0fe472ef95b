// src/http.rs
//! Feed and page retrieval. Retries are a job concern, so nothing here retries.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str =
    "article-pipeline/0.1 (+https://github.com/article-pipeline/article-pipeline)";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Raw feed document (RSS/Atom XML).
    async fn fetch_feed(&self, url: &str) -> Result<String, HttpError>;
    /// Raw page markup for an article URL.
    async fn fetch_page(&self, url: &str) -> Result<String, HttpError>;
}

/// reqwest-backed fetcher with a bounded timeout and a descriptive user agent.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str, accept: &str) -> Result<String, HttpError> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| HttpError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "non-2xx response");
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            message: format!("reading body: {e}"),
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<String, HttpError> {
        self.get_text(
            url,
            "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8",
        )
        .await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, HttpError> {
        self.get_text(url, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .await
    }
}
