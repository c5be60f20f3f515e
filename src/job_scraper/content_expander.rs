// src/job_scraper/content_expander.rs
use std::time::Duration;
use tracing::{debug, info, warn};

use super::record_extractor::{RecordExtractor, DESCRIPTION_CONTAINER};
use crate::browser::{BrowserSession, ClickTarget};
use crate::config::ScraperConfig;
use crate::error::Result;

/// What happened to the description, with the text to use from here on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// No "show more" control inside the description
    NotNeeded(String),
    Expanded(String),
    /// Control clicked but the text did not grow
    Unchanged(String),
    /// A previous call on this session already tried
    AlreadyExpanded(String),
}

impl Expansion {
    pub fn text(&self) -> &str {
        match self {
            Expansion::NotNeeded(text)
            | Expansion::Expanded(text)
            | Expansion::Unchanged(text)
            | Expansion::AlreadyExpanded(text) => text,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Expansion::NotNeeded(_) => "not_needed",
            Expansion::Expanded(_) => "expanded",
            Expansion::Unchanged(_) => "unchanged",
            Expansion::AlreadyExpanded(_) => "already_expanded",
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Expansion::NotNeeded(text)
            | Expansion::Expanded(text)
            | Expansion::Unchanged(text)
            | Expansion::AlreadyExpanded(text) => text,
        }
    }
}

pub struct ContentExpander {
    settle: Duration,
    controls: Vec<ClickTarget>,
    extractor: RecordExtractor,
}

impl ContentExpander {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            settle: Duration::from_millis(config.expand_settle_ms),
            controls: Self::show_more_controls(),
            extractor: RecordExtractor::new(),
        }
    }

    pub fn show_more_controls() -> Vec<ClickTarget> {
        [
            ClickTarget::css("button.show-more-less-html__button--more"),
            ClickTarget::css("[data-tracking-control-name=\"public_jobs_show-more-html-btn\"]"),
            ClickTarget::css("button[aria-label=\"Show more\"]"),
            ClickTarget::css("button").with_text("Show more"),
        ]
        .into_iter()
        .map(|target| target.within(DESCRIPTION_CONTAINER))
        .collect()
    }

    /// Clicks at most one control, at most once per session.
    pub async fn expand(&self, session: &mut BrowserSession) -> Result<Expansion> {
        let before = self.extractor.description(&session.snapshot().await?);

        if !session.begin_expansion() {
            debug!(session = session.id(), "Description expansion already attempted");
            return Ok(Expansion::AlreadyExpanded(before));
        }

        let mut clicked = None;
        for control in &self.controls {
            match session.click_visible(control).await {
                Ok(true) => {
                    clicked = Some(control.describe());
                    break;
                }
                Ok(false) => {}
                Err(e) => warn!(session = session.id(), "Show more via {} failed: {}", control.describe(), e),
            }
        }

        let Some(control) = clicked else {
            debug!(session = session.id(), "No show more control found");
            return Ok(Expansion::NotNeeded(before));
        };

        info!(session = session.id(), "Clicked show more button: {}", control);
        tokio::time::sleep(self.settle).await;

        let after = self.extractor.description(&session.snapshot().await?);
        if after.chars().count() > before.chars().count() {
            info!(
                session = session.id(),
                "Description expanded from {} to {} chars",
                before.chars().count(),
                after.chars().count()
            );
            Ok(Expansion::Expanded(after))
        } else {
            Ok(Expansion::Unchanged(before))
        }
    }
}
