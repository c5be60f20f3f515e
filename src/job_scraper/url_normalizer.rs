// src/job_scraper/url_normalizer.rs
//! Turns any recognizable job-posting link into its guest (logged-out) form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};

const GUEST_PATH_PREFIX: &str = "/jobs-guest/jobs/view";
const JOB_ID_QUERY_KEY: &str = "currentJobId";

// Matches /jobs/view/{id}, /comm/jobs/view/{id}, /jobs-guest/jobs/view/{id}
// and slugged segments such as /jobs/view/backend-engineer-at-acme-{id}.
static JOB_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/jobs/view/(?:[^/]*-)?(\d+)(?:/|$)").expect("job path pattern is valid")
});

/// Normalized identity of one job posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTarget {
    pub source_url: String,
    pub guest_url: String,
    pub job_id: String,
}

#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    guest_base: Option<String>,
    job_host: String,
}

impl UrlNormalizer {
    pub fn new(guest_base: Option<String>, job_host: impl Into<String>) -> Self {
        Self {
            guest_base: guest_base.map(|base| base.trim_end_matches('/').to_string()),
            job_host: job_host.into().to_lowercase(),
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.guest_base.clone(), config.job_host.clone())
    }

    /// Pure and deterministic: no network, same input → same target.
    pub fn normalize(&self, url: &str) -> Result<JobTarget> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ScrapeError::invalid_url(url, "empty URL"));
        }

        let parsed = Url::parse(trimmed)
            .map_err(|e| ScrapeError::invalid_url(url, format!("unparseable URL: {}", e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScrapeError::invalid_url(
                url,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }
        if parsed.host_str().is_none() {
            return Err(ScrapeError::invalid_url(url, "URL has no host"));
        }

        let job_id = Self::extract_job_id(&parsed)
            .ok_or_else(|| ScrapeError::invalid_url(url, "no job identifier in URL"))?;

        let base = match &self.guest_base {
            Some(base) => base.clone(),
            None => parsed.origin().ascii_serialization(),
        };

        Ok(JobTarget {
            source_url: url.to_string(),
            guest_url: format!("{}{}/{}/", base, GUEST_PATH_PREFIX, job_id),
            job_id,
        })
    }

    /// Guest URL only; convenience for callers that do not need the target.
    pub fn guest_url(&self, url: &str) -> Result<String> {
        self.normalize(url).map(|target| target.guest_url)
    }

    /// True when the URL is on the configured job host and carries a job id.
    pub fn is_job_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url.trim()) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };

        let host = host.to_lowercase();
        let on_job_host = host == self.job_host || host.ends_with(&format!(".{}", self.job_host));

        on_job_host && JOB_PATH.is_match(parsed.path())
    }

    fn extract_job_id(url: &Url) -> Option<String> {
        if let Some(caps) = JOB_PATH.captures(url.path()) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }

        url.query_pairs()
            .find(|(key, _)| key == JOB_ID_QUERY_KEY)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
    }
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::from_config(&ScraperConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_site_example_with_trailing_segment() {
        let target = UrlNormalizer::default()
            .normalize("https://site.example/jobs/view/4267053111/extra")
            .unwrap();
        assert_eq!(
            target.guest_url,
            "https://site.example/jobs-guest/jobs/view/4267053111/"
        );
        assert_eq!(target.job_id, "4267053111");
        assert_eq!(target.source_url, "https://site.example/jobs/view/4267053111/extra");
    }

    #[test]
    fn test_known_path_shapes() {
        let normalizer = UrlNormalizer::default();
        let cases = [
            ("https://www.linkedin.com/jobs/view/1234567890/", "1234567890"),
            ("https://linkedin.com/jobs/view/9876543210", "9876543210"),
            ("https://www.linkedin.com/comm/jobs/view/1111111111/", "1111111111"),
            ("https://www.linkedin.com/jobs-guest/jobs/view/3333333333/", "3333333333"),
            (
                "https://www.linkedin.com/jobs/view/senior-rust-engineer-at-acme-4242424242/",
                "4242424242",
            ),
            (
                "https://www.linkedin.com/jobs/search/?currentJobId=5555555555&keywords=rust",
                "5555555555",
            ),
        ];
        for (url, expected) in cases {
            let target = normalizer.normalize(url).unwrap();
            assert_eq!(target.job_id, expected, "url: {}", url);
        }
    }

    #[test]
    fn test_tracking_params_are_dropped() {
        let guest = UrlNormalizer::default()
            .guest_url("https://www.linkedin.com/jobs/view/1234567890/?utm_source=email&refId=abc123&trackingId=xyz789#top")
            .unwrap();
        assert_eq!(guest, "https://www.linkedin.com/jobs-guest/jobs/view/1234567890/");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = UrlNormalizer::default();
        for url in [
            "https://site.example/jobs/view/4267053111/extra",
            "https://www.linkedin.com/comm/jobs/view/1111111111/?trk=eml",
            "http://localhost:8080/jobs/view/77/",
        ] {
            let first = normalizer.normalize(url).unwrap();
            let second = normalizer.normalize(&first.guest_url).unwrap();
            assert_eq!(second.guest_url, first.guest_url);
            assert_eq!(second.job_id, first.job_id);
        }
    }

    #[test]
    fn test_port_is_kept_in_origin() {
        let guest = UrlNormalizer::default()
            .guest_url("http://localhost:8080/jobs/view/77")
            .unwrap();
        assert_eq!(guest, "http://localhost:8080/jobs-guest/jobs/view/77/");
    }

    #[test]
    fn test_guest_base_override() {
        let normalizer = UrlNormalizer::new(Some("https://www.linkedin.com/".to_string()), "linkedin.com");
        let guest = normalizer
            .guest_url("https://linkedin.com/jobs/view/9876543210")
            .unwrap();
        assert_eq!(guest, "https://www.linkedin.com/jobs-guest/jobs/view/9876543210/");
    }

    #[test]
    fn test_malformed_urls_are_invalid() {
        let normalizer = UrlNormalizer::default();
        for url in [
            "",
            "not-a-url",
            "https://www.linkedin.com/feed/",
            "https://linkedin.com/jobs/search",
            "https://linkedin.com/jobs/view/extra/",
            "https://linkedin.com/jobs/search/?currentJobId=abc",
            "ftp://linkedin.com/jobs/view/123/",
        ] {
            let err = normalizer.normalize(url).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidUrl, "url: {:?}", url);
        }
    }

    #[test]
    fn test_is_job_url() {
        let normalizer = UrlNormalizer::default();
        assert!(normalizer.is_job_url("https://www.linkedin.com/jobs/view/1234567890/"));
        assert!(normalizer.is_job_url("https://linkedin.com/comm/jobs/view/2222222222"));
        assert!(!normalizer.is_job_url("https://google.com"));
        assert!(!normalizer.is_job_url("https://linkedin.com/profile/user"));
        assert!(!normalizer.is_job_url("https://indeed.com/jobs/view/123"));
        assert!(!normalizer.is_job_url("https://notlinkedin.com/jobs/view/123"));
        assert!(!normalizer.is_job_url("not-a-url"));
    }
}
