//! Testing utilities: a scripted, in-memory browser engine.
//!
//! `MockEngine` serves fixed HTML per URL, simulates clicks by swapping the
//! document for a scripted follow-up, can hang or fail navigations on demand,
//! and records every call so tests can assert on session lifecycle.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::browser::{BrowserEngine, BrowserPage, ClickTarget};
use crate::error::{PageError, PageResult, Result, ScrapeError};
use crate::utils::clean_text;

/// Record of a call made against the mock engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Launch,
    Goto(String),
    Click(String),
    Close,
}

/// Scripted behavior for one URL
#[derive(Debug, Clone)]
pub struct MockSite {
    html: String,
    hang_first: usize,
    failure: Option<String>,
    transitions: Vec<(String, String)>,
}

impl MockSite {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            hang_first: 0,
            failure: None,
            transitions: Vec::new(),
        }
    }

    /// The first `n` navigations to this URL never complete.
    pub fn hang_first(mut self, n: usize) -> Self {
        self.hang_first = n;
        self
    }

    /// Every navigation fails with a protocol error.
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Clicking an element matched by `selector` replaces the document.
    pub fn on_click(mut self, selector: impl Into<String>, html_after: impl Into<String>) -> Self {
        self.transitions.push((selector.into(), html_after.into()));
        self
    }
}

#[derive(Default)]
struct MockState {
    sites: Mutex<HashMap<String, MockSite>>,
    events: Mutex<Vec<MockEvent>>,
    goto_counts: Mutex<HashMap<String, usize>>,
    unavailable: Option<String>,
    failing_launches: AtomicUsize,
    launch_attempts: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

impl MockState {
    fn record(&self, event: MockEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose browser binary is "missing".
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: Arc::new(MockState {
                unavailable: Some(reason.into()),
                ..Default::default()
            }),
        }
    }

    pub fn with_site(self, url: impl Into<String>, site: MockSite) -> Self {
        self.state.sites.lock().unwrap().insert(url.into(), site);
        self
    }

    /// The next `n` launches fail with a (non-fatal) session error.
    pub fn fail_launches(self, n: usize) -> Self {
        self.state.failing_launches.store(n, Ordering::SeqCst);
        self
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.state.launch_attempts.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MockEvent::Close))
            .count()
    }

    pub fn goto_count(&self, url: &str) -> usize {
        self.state
            .goto_counts
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn clicks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Click(target) => Some(target),
                _ => None,
            })
            .collect()
    }

    /// Highest number of sessions that were ever open at the same time
    pub fn max_open_sessions(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>> {
        self.state.launch_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.state.unavailable {
            return Err(ScrapeError::EngineUnavailable(reason.clone()));
        }

        let failing = self.state.failing_launches.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_launches.store(failing - 1, Ordering::SeqCst);
            return Err(ScrapeError::Session("mock browser crashed on start".to_string()));
        }

        self.state.record(MockEvent::Launch);
        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(MockPage {
            state: Arc::clone(&self.state),
            document: Mutex::new(None),
        }))
    }
}

struct LoadedDocument {
    site: MockSite,
    html: String,
}

pub struct MockPage {
    state: Arc<MockState>,
    document: Mutex<Option<LoadedDocument>>,
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn goto(&self, url: &str) -> PageResult<()> {
        self.state.record(MockEvent::Goto(url.to_string()));
        let attempt = {
            let mut counts = self.state.goto_counts.lock().unwrap();
            let count = counts.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let site = self.state.sites.lock().unwrap().get(url).cloned();
        let Some(site) = site else {
            return Err(PageError::Protocol("net::ERR_NAME_NOT_RESOLVED".to_string()));
        };

        if attempt <= site.hang_first {
            std::future::pending::<()>().await;
        }
        if let Some(message) = &site.failure {
            return Err(PageError::Protocol(message.clone()));
        }

        let html = site.html.clone();
        *self.document.lock().unwrap() = Some(LoadedDocument { site, html });
        Ok(())
    }

    async fn content(&self) -> PageResult<String> {
        Ok(self
            .document
            .lock()
            .unwrap()
            .as_ref()
            .map(|doc| doc.html.clone())
            .unwrap_or_else(|| "<html><head></head><body></body></html>".to_string()))
    }

    async fn click_visible(&self, target: &ClickTarget) -> PageResult<bool> {
        let mut guard = self.document.lock().unwrap();
        let Some(doc) = guard.as_mut() else {
            return Ok(false);
        };

        if !has_clickable(&doc.html, target) {
            return Ok(false);
        }

        self.state.record(MockEvent::Click(target.describe()));
        if let Some((_, next)) = doc
            .site
            .transitions
            .iter()
            .find(|(selector, _)| *selector == target.selector)
        {
            doc.html = next.clone();
        }
        Ok(true)
    }

    async fn close(self: Box<Self>) -> PageResult<()> {
        self.state.record(MockEvent::Close);
        self.state.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn has_clickable(html: &str, target: &ClickTarget) -> bool {
    let Ok(selector) = Selector::parse(&target.selector) else {
        return false;
    };
    let within = target.within.as_deref().and_then(|s| Selector::parse(s).ok());
    let outside = target.outside.as_deref().and_then(|s| Selector::parse(s).ok());

    let document = Html::parse_document(html);
    let found = document.select(&selector).any(|element| {
        if !is_visible(element) {
            return false;
        }
        if let Some(text) = &target.text {
            let own = clean_text(&element.text().collect::<String>());
            if !own.eq_ignore_ascii_case(text.trim()) {
                return false;
            }
        }
        if let Some(within) = &within {
            if !self_or_ancestor_matches(element, within) {
                return false;
            }
        }
        if let Some(outside) = &outside {
            if self_or_ancestor_matches(element, outside) {
                return false;
            }
        }
        true
    });
    found
}

fn self_or_ancestor_matches(element: ElementRef, selector: &Selector) -> bool {
    selector.matches(&element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| selector.matches(&ancestor))
}

fn is_visible(element: ElementRef) -> bool {
    let hidden = |el: ElementRef| {
        el.value().attr("hidden").is_some()
            || el
                .value()
                .attr("style")
                .map(|style| style.replace(' ', "").contains("display:none"))
                .unwrap_or(false)
    };
    !hidden(element) && !element.ancestors().filter_map(ElementRef::wrap).any(hidden)
}
