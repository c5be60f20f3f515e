//! Browser-driven scraper for public job postings.
//!
//! `JobScraper` normalizes job links to their guest form, paces requests,
//! drives one headless browser session per posting and turns the rendered
//! page into a `JobRecord`.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod job_scraper;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::ScraperConfig;
pub use error::{ErrorKind, Result, ScrapeError};
pub use job_scraper::{BatchReport, JobScraper, JobTarget, UrlNormalizer};
pub use types::{BatchResult, FailureDescriptor, ItemState, JobRecord, JobSummary};
