// src/job_scraper/mod.rs
//! Scrapes guest job pages one at a time through a single browser slot.
//!
//! Per item: normalize the URL, wait out the rate limiter, open a fresh
//! session, navigate, dismiss overlays, expand the description, extract,
//! then release the session on every path.

pub mod content_expander;
pub mod interference;
pub mod rate_limiter;
pub mod record_extractor;
pub mod url_normalizer;

use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::browser::{BrowserEngine, BrowserSession, ChromiumEngine, NavigationPolicy, SessionPool};
use crate::config::ScraperConfig;
use crate::error::{ErrorKind, Result, ScrapeError};
use crate::types::{BatchResult, FailureDescriptor, ItemProgress, ItemState, JobRecord, JobSummary};

pub use content_expander::{ContentExpander, Expansion};
pub use interference::{DismissReport, InterferenceHandler};
pub use rate_limiter::{DelayWindow, RateLimiter};
pub use record_extractor::{ExtractedFields, RecordExtractor};
pub use url_normalizer::{JobTarget, UrlNormalizer};

/// Full account of one `scrape_batch` call
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub results: Vec<BatchResult>,
    pub requested: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// URLs past `max_items` that were never attempted
    pub skipped_over_limit: usize,
    pub deadline_hit: bool,
}

pub struct JobScraper {
    config: ScraperConfig,
    normalizer: UrlNormalizer,
    limiter: RateLimiter,
    pool: SessionPool,
    policy: NavigationPolicy,
    interference: InterferenceHandler,
    expander: ContentExpander,
    extractor: RecordExtractor,
}

impl JobScraper {
    pub fn new(config: ScraperConfig, engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            normalizer: UrlNormalizer::from_config(&config),
            limiter: RateLimiter::new(&config),
            pool: SessionPool::new(engine),
            policy: NavigationPolicy::from_config(&config),
            interference: InterferenceHandler::new(&config),
            expander: ContentExpander::new(&config),
            extractor: RecordExtractor::new(),
            config,
        }
    }

    /// Scraper backed by a local headless Chromium
    pub fn with_chromium(config: ScraperConfig) -> Self {
        let engine = ChromiumEngine::new(config.browser.clone());
        Self::new(config, Arc::new(engine))
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn is_job_url(&self, url: &str) -> bool {
        self.normalizer.is_job_url(url)
    }

    pub fn guest_url(&self, url: &str) -> Result<String> {
        self.normalizer.guest_url(url)
    }

    /// Scrapes one posting. The description is capped at `max_content_length`.
    pub async fn scrape_one(&self, url: &str) -> Result<JobRecord> {
        let mut progress = ItemProgress::new(url);
        let mut slot = None;
        let outcome = self.run_item(url, 0, &mut progress, &mut slot).await;
        Self::release(&mut slot).await;

        match outcome {
            Ok(record) => {
                progress.advance(ItemState::Succeeded);
                Ok(record.capped(self.config.max_content_length))
            }
            Err(e) => {
                let stage = progress.fail();
                warn!("Failed to scrape {} while {:?}: {}", url, stage, e);
                Err(e)
            }
        }
    }

    pub async fn summarize(&self, url: &str) -> Result<JobSummary> {
        self.scrape_one(url).await.map(|record| record.summary())
    }

    /// One result per processed URL, in input order. Only a zero `max_items`
    /// is an error; item failures are reported inside the results.
    pub async fn scrape_many<S: AsRef<str>>(&self, urls: &[S], max_items: usize) -> Result<Vec<BatchResult>> {
        let report = self.scrape_batch(urls, max_items, None).await?;
        Ok(report.results)
    }

    /// Like `scrape_many`, but stops at `deadline`. The item in flight at the
    /// deadline is recorded as `deadline_exceeded` after its session is released.
    pub async fn scrape_many_until<S: AsRef<str>>(
        &self,
        urls: &[S],
        max_items: usize,
        deadline: Instant,
    ) -> Result<Vec<BatchResult>> {
        let report = self.scrape_batch(urls, max_items, Some(deadline)).await?;
        Ok(report.results)
    }

    /// Without an explicit deadline, `batch_deadline_secs` from the config applies.
    pub async fn scrape_batch<S: AsRef<str>>(
        &self,
        urls: &[S],
        max_items: usize,
        deadline: Option<Instant>,
    ) -> Result<BatchReport> {
        if max_items == 0 {
            return Err(ScrapeError::InvalidArgument(
                "max_items must be at least 1".to_string(),
            ));
        }

        let batch_id = Uuid::new_v4();
        let deadline = deadline.or_else(|| self.config.batch_deadline().map(|d| Instant::now() + d));
        let limit = urls.len().min(max_items);
        let mut results = Vec::with_capacity(limit);
        let mut fatal: Option<FailureDescriptor> = None;
        let mut deadline_hit = false;

        info!(%batch_id, "Starting to scrape {} job pages", limit);
        if urls.len() > limit {
            info!(%batch_id, "Skipping {} URLs over the limit of {}", urls.len() - limit, max_items);
        }

        for (index, url) in urls.iter().take(limit).enumerate() {
            let url = url.as_ref();

            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(%batch_id, "Batch deadline reached before item {}", index + 1);
                deadline_hit = true;
                break;
            }

            if let Some(descriptor) = &fatal {
                let failure = match self.normalizer.normalize(url) {
                    Err(e) => FailureDescriptor::new(url, &e, ItemState::Normalizing),
                    Ok(_) => FailureDescriptor {
                        url: url.to_string(),
                        ..descriptor.clone()
                    },
                };
                results.push(BatchResult::Failed(failure));
                continue;
            }

            let span = info_span!("job", %batch_id, index, url);
            let (result, timed_out) = self
                .process_item(url, index, deadline)
                .instrument(span)
                .await;

            if let BatchResult::Failed(descriptor) = &result {
                if descriptor.error_kind == ErrorKind::EngineUnavailable {
                    fatal = Some(descriptor.clone());
                }
            }
            results.push(result);

            if timed_out {
                deadline_hit = true;
                break;
            }
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(%batch_id, "Completed scraping: {}/{} jobs successful", succeeded, limit);

        Ok(BatchReport {
            batch_id,
            requested: urls.len(),
            processed: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            skipped_over_limit: urls.len() - limit,
            deadline_hit,
            results,
        })
    }

    /// Returns the item's result and whether the deadline cut it short.
    async fn process_item(&self, url: &str, position: usize, deadline: Option<Instant>) -> (BatchResult, bool) {
        let mut progress = ItemProgress::new(url);
        let mut slot = None;

        let work = self.run_item(url, position, &mut progress, &mut slot);
        let outcome = match deadline {
            Some(deadline) => tokio::select! {
                result = work => Some(result),
                _ = tokio::time::sleep_until(deadline) => None,
            },
            None => Some(work.await),
        };
        Self::release(&mut slot).await;

        match outcome {
            Some(Ok(record)) => {
                progress.advance(ItemState::Succeeded);
                info!("Scraped job {}", record.job_id());
                (
                    BatchResult::Succeeded(record.capped(self.config.max_content_length)),
                    false,
                )
            }
            Some(Err(e)) => {
                let stage = progress.fail();
                warn!("Failed to scrape {} while {:?}: {}", url, stage, e);
                (BatchResult::Failed(FailureDescriptor::new(url, &e, stage)), false)
            }
            None => {
                let stage = progress.fail();
                warn!("Batch deadline hit while {:?} on {}", stage, url);
                (
                    BatchResult::Failed(FailureDescriptor::new(url, &ScrapeError::DeadlineExceeded, stage)),
                    true,
                )
            }
        }
    }

    /// Pipeline for a single URL. The session is parked in `slot` so the
    /// caller can release it even if this future is dropped midway.
    async fn run_item(
        &self,
        url: &str,
        position: usize,
        progress: &mut ItemProgress,
        slot: &mut Option<BrowserSession>,
    ) -> Result<JobRecord> {
        progress.advance(ItemState::Normalizing);
        let target = self.normalizer.normalize(url)?;
        debug!("Normalized {} to {}", url, target.guest_url);

        progress.advance(ItemState::Waiting);
        if let Some(err) = self.pool.fatal_error() {
            return Err(err);
        }
        self.limiter.wait(position).await;

        progress.advance(ItemState::Navigating);
        let session = slot.insert(self.pool.acquire().await?);
        let handle = session.navigate(&target.guest_url, &self.policy).await?;
        debug!("Loaded {} ({:?} tier)", handle.url, handle.tier);

        progress.advance(ItemState::Dismissing);
        self.interference.dismiss(session).await;

        progress.advance(ItemState::Expanding);
        let expansion = self.expander.expand(session).await?;
        debug!("Description expansion: {}", expansion.label());

        progress.advance(ItemState::Extracting);
        let html = session.snapshot().await?;
        let fields = self
            .extractor
            .extract(&html, &target, Some(expansion.into_text()))?;

        Ok(JobRecord::from_extraction(&target, fields))
    }

    async fn release(slot: &mut Option<BrowserSession>) {
        if let Some(session) = slot.take() {
            session.release().await;
        }
    }
}
