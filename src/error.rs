// src/error.rs
//! Stage failure taxonomy. Every variant renders to the human-readable string
//! stored on the job record as `lastError`.

use thiserror::Error;
use uuid::Uuid;

use crate::http::HttpError;
use crate::model::{ArticleStatus, JobKind};

/// How a failure is expected to behave under retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing source/article/report; only a race makes a retry succeed.
    NotFound,
    /// Network, non-2xx, provider outage, storage hiccup.
    Transient,
    /// Extracted text too short; retried, then terminal.
    ContentQuality,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("source {0} not found")]
    SourceNotFound(Uuid),

    #[error("source {0} has no feed url")]
    SourceWithoutFeed(Uuid),

    #[error("article {0} not found")]
    ArticleNotFound(Uuid),

    #[error("report for article {0} not found")]
    ReportNotFound(Uuid),

    #[error("article {id} is {actual}, expected {expected}")]
    UnexpectedStatus {
        id: Uuid,
        actual: ArticleStatus,
        expected: &'static str,
    },

    #[error("article {0} has missing raw text")]
    MissingRawText(Uuid),

    #[error("{kind} job payload is missing {field}")]
    InvalidPayload { kind: JobKind, field: &'static str },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("feed parse failed: {0}")]
    FeedParse(String),

    #[error("extracted text too short: {chars} chars (minimum {min})")]
    ContentTooShort { chars: usize, min: usize },

    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("text generation returned incomplete payload: missing {0}")]
    IncompleteGeneration(&'static str),

    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl StageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StageError::SourceNotFound(_)
            | StageError::SourceWithoutFeed(_)
            | StageError::ArticleNotFound(_)
            | StageError::ReportNotFound(_)
            | StageError::UnexpectedStatus { .. }
            | StageError::MissingRawText(_)
            | StageError::InvalidPayload { .. } => ErrorClass::NotFound,
            StageError::ContentTooShort { .. } => ErrorClass::ContentQuality,
            StageError::Http(_)
            | StageError::FeedParse(_)
            | StageError::Generation(_)
            | StageError::IncompleteGeneration(_)
            | StageError::Store(_) => ErrorClass::Transient,
        }
    }
}

pub type StageResult<T> = std::result::Result<T, StageError>;
