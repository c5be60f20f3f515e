// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const ENV_PREFIX: &str = "JOB_SCRAPER_";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Every tunable of the scraping engine. Passed by value into `JobScraper::new`;
/// nothing is read from globals after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Extra delay added per batch position
    pub batch_step_ms: u64,
    /// Upper bound for any single inter-request delay
    pub max_batch_delay_ms: u64,
    pub navigation_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
    pub primary_settle_ms: u64,
    pub fallback_settle_ms: u64,
    pub popup_wait_ms: u64,
    pub dismiss_settle_ms: u64,
    pub expand_settle_ms: u64,
    /// Description cap applied when a record is handed back to the caller
    pub max_content_length: usize,
    pub batch_deadline_secs: Option<u64>,
    /// Overrides the guest URL origin (defaults to the input URL's origin)
    pub guest_base: Option<String>,
    /// Host suffix accepted by `is_job_url`
    pub job_host: String,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub disable_images: bool,
    pub extra_args: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 2_000,
            max_delay_ms: 6_000,
            batch_step_ms: 500,
            max_batch_delay_ms: 10_000,
            navigation_timeout_ms: 15_000,
            fallback_timeout_ms: 30_000,
            primary_settle_ms: 1_000,
            fallback_settle_ms: 2_000,
            popup_wait_ms: 1_000,
            dismiss_settle_ms: 500,
            expand_settle_ms: 2_000,
            max_content_length: 15_000,
            batch_deadline_secs: None,
            guest_base: None,
            job_host: "linkedin.com".to_string(),
            browser: BrowserSettings::default(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_width: 1920,
            window_height: 1080,
            disable_images: true,
            extra_args: Vec::new(),
        }
    }
}

impl ScraperConfig {
    /// Defaults, then the optional file, then `JOB_SCRAPER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        info!(
            "Scraper configuration loaded (delay {}-{}ms, timeouts {}/{}ms)",
            config.min_delay_ms,
            config.max_delay_ms,
            config.navigation_timeout_ms,
            config.fallback_timeout_ms
        );
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            _ => anyhow::bail!(
                "Unsupported config file extension: {}. Use .yaml, .yml or .toml",
                path.display()
            ),
        }
    }

    /// Applies overrides from any key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let numeric = [
            ("MIN_DELAY_MS", &mut self.min_delay_ms),
            ("MAX_DELAY_MS", &mut self.max_delay_ms),
            ("BATCH_STEP_MS", &mut self.batch_step_ms),
            ("MAX_BATCH_DELAY_MS", &mut self.max_batch_delay_ms),
            ("NAVIGATION_TIMEOUT_MS", &mut self.navigation_timeout_ms),
            ("FALLBACK_TIMEOUT_MS", &mut self.fallback_timeout_ms),
        ];
        for (name, slot) in numeric {
            if let Some(raw) = get(name) {
                *slot = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{}{} must be an integer", ENV_PREFIX, name))?;
            }
        }

        if let Some(raw) = get("MAX_CONTENT_LENGTH") {
            self.max_content_length = raw
                .trim()
                .parse()
                .with_context(|| format!("{}MAX_CONTENT_LENGTH must be an integer", ENV_PREFIX))?;
        }

        if let Some(raw) = get("BATCH_DEADLINE_SECS") {
            self.batch_deadline_secs = Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{}BATCH_DEADLINE_SECS must be an integer", ENV_PREFIX))?,
            );
        }

        if let Some(base) = get("GUEST_BASE") {
            self.guest_base = Some(base.trim_end_matches('/').to_string());
        }

        if let Some(executable) = get("CHROME_PATH") {
            self.browser.executable = Some(PathBuf::from(executable));
        }

        if let Some(raw) = get("HEADLESS") {
            self.browser.headless = !matches!(raw.to_lowercase().as_str(), "0" | "false" | "no");
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            anyhow::bail!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms,
                self.max_delay_ms
            );
        }
        if self.max_delay_ms > self.max_batch_delay_ms {
            anyhow::bail!(
                "max_delay_ms ({}) must not exceed max_batch_delay_ms ({})",
                self.max_delay_ms,
                self.max_batch_delay_ms
            );
        }
        if self.navigation_timeout_ms == 0 || self.fallback_timeout_ms == 0 {
            anyhow::bail!("navigation timeouts must be greater than zero");
        }
        if self.fallback_timeout_ms < self.navigation_timeout_ms {
            anyhow::bail!(
                "fallback_timeout_ms ({}) must be at least navigation_timeout_ms ({})",
                self.fallback_timeout_ms,
                self.navigation_timeout_ms
            );
        }
        if self.max_content_length == 0 {
            anyhow::bail!("max_content_length must be greater than zero");
        }
        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(Duration::from_secs)
    }

    /// Zero delays and short settles; used by tests and dry runs.
    pub fn without_delays() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            batch_step_ms: 0,
            max_batch_delay_ms: 0,
            primary_settle_ms: 0,
            fallback_settle_ms: 0,
            popup_wait_ms: 0,
            dismiss_settle_ms: 0,
            expand_settle_ms: 0,
            ..Self::default()
        }
    }
}
