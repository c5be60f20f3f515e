// src/types/job_record.rs
//! Job records and per-item batch outcomes handed back to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ScrapeError};
use crate::job_scraper::record_extractor::ExtractedFields;
use crate::job_scraper::url_normalizer::JobTarget;
use crate::types::item_state::ItemState;
use crate::utils::truncate_with_ellipsis;

/// A fully extracted job posting. Built once extraction completes and never
/// modified afterwards; callers read it through the accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    source_url: String,
    guest_url: String,
    job_id: String,
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    description: String,
    details: Vec<String>,
    page_title: Option<String>,
    scraped_at: DateTime<Utc>,
}

impl JobRecord {
    /// Stamps `scraped_at`; only called after every field has been parsed.
    pub(crate) fn from_extraction(target: &JobTarget, fields: ExtractedFields) -> Self {
        Self {
            source_url: target.source_url.clone(),
            guest_url: target.guest_url.clone(),
            job_id: target.job_id.clone(),
            title: fields.title,
            company: fields.company,
            location: fields.location,
            description: fields.description,
            details: fields.details,
            page_title: fields.page_title,
            scraped_at: Utc::now(),
        }
    }

    /// Boundary copy with the description capped at `max_chars` characters.
    pub(crate) fn capped(self, max_chars: usize) -> Self {
        let description = truncate_with_ellipsis(&self.description, max_chars);
        Self {
            description,
            ..self
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn guest_url(&self) -> &str {
        &self.guest_url
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn page_title(&self) -> Option<&str> {
        self.page_title.as_deref()
    }

    pub fn scraped_at(&self) -> DateTime<Utc> {
        self.scraped_at
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            title: self.title.clone(),
            company: self.company.clone(),
            location: self.location.clone(),
            source_url: self.source_url.clone(),
            guest_url: self.guest_url.clone(),
            scraped_at: self.scraped_at,
        }
    }
}

/// Short projection of a record for quick listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub source_url: String,
    pub guest_url: String,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub url: String,
    pub error_kind: ErrorKind,
    pub message: String,
    /// Stage the item was in when it failed
    pub stage: ItemState,
}

impl FailureDescriptor {
    pub fn new(url: impl Into<String>, error: &ScrapeError, stage: ItemState) -> Self {
        Self {
            url: url.into(),
            error_kind: error.kind(),
            message: error.to_string(),
            stage,
        }
    }
}

/// Outcome of one URL in a batch, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchResult {
    Succeeded(JobRecord),
    Failed(FailureDescriptor),
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Succeeded(_))
    }

    pub fn record(&self) -> Option<&JobRecord> {
        match self {
            BatchResult::Succeeded(record) => Some(record),
            BatchResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureDescriptor> {
        match self {
            BatchResult::Succeeded(_) => None,
            BatchResult::Failed(failure) => Some(failure),
        }
    }
}
