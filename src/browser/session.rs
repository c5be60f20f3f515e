// src/browser/session.rs
//! Scoped browser sessions handed out by a pool of size one.
//!
//! A session owns its page and the pool permit. `release()` closes the
//! browser first and gives the permit back afterwards, so a new session can
//! only start once the previous browser is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use super::{BrowserEngine, BrowserPage, ClickTarget};
use crate::config::ScraperConfig;
use crate::error::{PageError, PageResult, Result, ScrapeError};

const POOL_SIZE: usize = 1;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Two-tier navigation timeouts plus the pause after each tier succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationPolicy {
    pub primary_timeout: Duration,
    pub fallback_timeout: Duration,
    pub primary_settle: Duration,
    pub fallback_settle: Duration,
}

impl NavigationPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            primary_timeout: config.navigation_timeout(),
            fallback_timeout: config.fallback_timeout(),
            primary_settle: Duration::from_millis(config.primary_settle_ms),
            fallback_settle: Duration::from_millis(config.fallback_settle_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTier {
    Primary,
    Fallback,
}

/// Proof that a navigation finished; the document itself is read through
/// `BrowserSession::snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub url: String,
    pub tier: LoadTier,
}

pub struct SessionPool {
    engine: Arc<dyn BrowserEngine>,
    permits: Arc<Semaphore>,
    fatal: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl SessionPool {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(POOL_SIZE)),
            fatal: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Set once the engine reported itself unlaunchable; never retried.
    pub fn fatal_error(&self) -> Option<ScrapeError> {
        self.fatal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .map(ScrapeError::EngineUnavailable)
    }

    pub async fn acquire(&self) -> Result<BrowserSession> {
        if let Some(err) = self.fatal_error() {
            return Err(err);
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScrapeError::Session("session pool is closed".to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.engine.launch().await {
            Ok(page) => {
                debug!(session = id, "browser session acquired");
                Ok(BrowserSession {
                    id,
                    page: Some(page),
                    permit: Some(permit),
                    expansion_attempted: false,
                })
            }
            Err(ScrapeError::EngineUnavailable(reason)) => {
                error!("Browser engine unavailable, not retrying: {}", reason);
                *self.fatal.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                    Some(reason.clone());
                Err(ScrapeError::EngineUnavailable(reason))
            }
            Err(e) => {
                warn!(session = id, "Failed to launch browser session: {}", e);
                Err(e)
            }
        }
    }
}

pub struct BrowserSession {
    id: u64,
    page: Option<Box<dyn BrowserPage>>,
    permit: Option<OwnedSemaphorePermit>,
    expansion_attempted: bool,
}

impl BrowserSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn page(&self) -> Result<&dyn BrowserPage> {
        self.page
            .as_deref()
            .ok_or_else(|| ScrapeError::Session("session already released".to_string()))
    }

    /// Primary tier first; only a timeout there earns one fallback attempt.
    pub async fn navigate(&mut self, url: &str, policy: &NavigationPolicy) -> Result<DocumentHandle> {
        let page = self.page()?;
        info!(session = self.id, "Navigating to {}", url);

        match tokio::time::timeout(policy.primary_timeout, page.goto(url)).await {
            Ok(Ok(())) => {
                tokio::time::sleep(policy.primary_settle).await;
                return Ok(DocumentHandle {
                    url: url.to_string(),
                    tier: LoadTier::Primary,
                });
            }
            Ok(Err(PageError::Timeout)) | Err(_) => {
                warn!(
                    session = self.id,
                    "Fast load of {} timed out after {}ms, trying fallback",
                    url,
                    policy.primary_timeout.as_millis()
                );
            }
            Ok(Err(e)) => return Err(Self::navigation_error(url, e)),
        }

        match tokio::time::timeout(policy.fallback_timeout, page.goto(url)).await {
            Ok(Ok(())) => {
                tokio::time::sleep(policy.fallback_settle).await;
                Ok(DocumentHandle {
                    url: url.to_string(),
                    tier: LoadTier::Fallback,
                })
            }
            Ok(Err(PageError::Timeout)) | Err(_) => {
                error!(session = self.id, "Page load failed completely for {}", url);
                Err(ScrapeError::NavigationTimeout {
                    url: url.to_string(),
                    primary_ms: policy.primary_timeout.as_millis() as u64,
                    fallback_ms: policy.fallback_timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(Self::navigation_error(url, e)),
        }
    }

    fn navigation_error(url: &str, err: PageError) -> ScrapeError {
        match err {
            PageError::Closed => ScrapeError::Session(format!("page closed while loading {}", url)),
            other => ScrapeError::Navigation {
                url: url.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub async fn snapshot(&self) -> Result<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| ScrapeError::Session(format!("failed to read document: {}", e)))
    }

    pub async fn click_visible(&self, target: &ClickTarget) -> PageResult<bool> {
        match self.page.as_deref() {
            Some(page) => page.click_visible(target).await,
            None => Err(PageError::Closed),
        }
    }

    /// Returns true the first time it is called for this session.
    pub(crate) fn begin_expansion(&mut self) -> bool {
        !std::mem::replace(&mut self.expansion_attempted, true)
    }

    /// Closes the browser, then frees the pool slot.
    pub async fn release(mut self) {
        if let Some(page) = self.page.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, page.close()).await {
                Ok(Ok(())) => debug!(session = self.id, "browser session released"),
                Ok(Err(e)) => warn!(session = self.id, "Browser close reported an error: {}", e),
                Err(_) => warn!(session = self.id, "Browser close timed out"),
            }
        }
        self.permit.take();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let permit = self.permit.take();
        let id = self.id;

        warn!(session = id, "Browser session dropped without release, closing in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!(session = id, "Background browser close failed: {}", e);
                    }
                    drop(permit);
                });
            }
            Err(_) => error!(session = id, "No runtime available to close dropped browser session"),
        }
    }
}
