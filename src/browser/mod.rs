// src/browser/mod.rs
//! Browser automation seam.
//!
//! `BrowserEngine` launches one isolated page per scrape and `BrowserPage`
//! is the handful of operations the scraper needs from it. The production
//! engine drives headless Chromium; `crate::testing` provides a scripted one.

pub mod chromium;
pub mod session;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{PageResult, Result};

pub use chromium::ChromiumEngine;
pub use session::{BrowserSession, DocumentHandle, LoadTier, NavigationPolicy, SessionPool};

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Starts a fresh browser context. Fails with `EngineUnavailable` when the
    /// browser binary cannot be found or started, `Session` otherwise.
    async fn launch(&self) -> Result<Box<dyn BrowserPage>>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigates and resolves once the document has loaded
    async fn goto(&self, url: &str) -> PageResult<()>;

    /// Serialized HTML of the current document
    async fn content(&self) -> PageResult<String>;

    /// Clicks the first visible element matching `target`; `Ok(false)` when
    /// nothing matched.
    async fn click_visible(&self, target: &ClickTarget) -> PageResult<bool>;

    /// Tears down the page and the browser behind it
    async fn close(self: Box<Self>) -> PageResult<()>;
}

/// Describes an element to click: a CSS selector, optionally narrowed by
/// its visible text and by the containers it must (not) sit in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickTarget {
    pub selector: String,
    /// Case-insensitive match against the trimmed element text
    pub text: Option<String>,
    pub within: Option<String>,
    pub outside: Option<String>,
}

impl ClickTarget {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
            within: None,
            outside: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn within(mut self, container: impl Into<String>) -> Self {
        self.within = Some(container.into());
        self
    }

    pub fn outside(mut self, container: impl Into<String>) -> Self {
        self.outside = Some(container.into());
        self
    }

    pub fn describe(&self) -> String {
        match &self.text {
            Some(text) => format!("{} [text=\"{}\"]", self.selector, text),
            None => self.selector.clone(),
        }
    }
}
