use std::fmt;
use std::time::Duration;

use scrape_core::AcquisitionStatus;
use serde::{Deserialize, Serialize};

use crate::retry::FailureClass;

/// One article as discovered on a listing page and, optionally, its detail page.
///
/// Field names on the wire follow the article cache format (`publish_time`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    /// Raw timestamp text; its format varies by page variant and is never parsed here.
    #[serde(rename = "publish_time", default)]
    pub published_at: String,
    #[serde(default)]
    pub read_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub content: String,
}

impl ArticleRecord {
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Result of one logical fetch after the retry policy has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { body: String, status: u16 },
    RetryableFailure(FetchError),
    FatalFailure(FetchError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::RetryableFailure(err) | FetchOutcome::FatalFailure(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "cancelled before the request completed")
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Why a fetch is issued; drives logging and progress events only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    Listing { page: u32 },
    Detail { index: usize },
}

impl fmt::Display for FetchPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPurpose::Listing { page } => write!(f, "listing page {page}"),
            FetchPurpose::Detail { index } => write!(f, "detail #{index}"),
        }
    }
}

/// Per-fetch context handed to a [`crate::Transport`].
pub struct FetchContext<'a> {
    pub purpose: FetchPurpose,
    pub referer: Option<&'a str>,
    pub sink: &'a dyn ProgressSink,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Attempt {
        purpose: FetchPurpose,
        attempt: u32,
        max_attempts: u32,
    },
    Backoff {
        purpose: FetchPurpose,
        class: FailureClass,
        wait: Duration,
    },
    PageExtracted {
        page: u32,
        records: usize,
    },
    ListingStopped {
        status: AcquisitionStatus,
    },
    DetailFetched {
        index: usize,
        url: String,
        content_chars: Option<usize>,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetailSummary {
    pub attempted: usize,
    pub fetched: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Everything a run produced: records in discovery order plus how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub records: Vec<ArticleRecord>,
    pub status: AcquisitionStatus,
    pub pages_fetched: u32,
    pub details: DetailSummary,
}
