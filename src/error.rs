// src/error.rs
//! Typed errors for the scraping engine.
//!
//! Library code returns `ScrapeError`; the binary and config loader sit on
//! `anyhow` and attach context on top.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by `scrape_one` and recorded per item by `scrape_many`.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// URL shape not recognized; raised before any browser work
    #[error("invalid job URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Page did not become ready within either timeout tier
    #[error("navigation to {url} timed out (primary {primary_ms}ms, fallback {fallback_ms}ms)")]
    NavigationTimeout {
        url: String,
        primary_ms: u64,
        fallback_ms: u64,
    },

    /// Page refused to load for a reason other than a timeout
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// Document loaded but the job content root is missing
    #[error("extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    /// Browser failed to start or stopped answering for this item
    #[error("browser session error: {0}")]
    Session(String),

    /// Browser binary missing or unlaunchable; fatal for the whole process
    #[error("browser engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("batch deadline exceeded")]
    DeadlineExceeded,

    /// Caller passed an argument no batch can satisfy
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Serializable classification of a `ScrapeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    NavigationTimeout,
    Navigation,
    Extraction,
    Session,
    EngineUnavailable,
    DeadlineExceeded,
    InvalidArgument,
}

impl ScrapeError {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn extraction(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::NavigationTimeout { .. } => ErrorKind::NavigationTimeout,
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Session(_) => ErrorKind::Session,
            Self::EngineUnavailable(_) => ErrorKind::EngineUnavailable,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// True for failures that end the whole process, not just one item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_))
    }
}

/// Low-level failures reported by a `BrowserPage` implementation.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    #[error("operation timed out")]
    Timeout,

    #[error("page was already closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

pub type PageResult<T> = std::result::Result<T, PageError>;
