// src/cli.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ScraperConfig;
use crate::job_scraper::{JobScraper, UrlNormalizer};

#[derive(Parser)]
#[command(name = "job-scraper")]
#[command(about = "Scrape public job postings through a headless browser")]
pub struct JobCli {
    #[command(subcommand)]
    pub command: JobCommand,

    /// YAML or TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Scrape a single job posting
    One { url: String },
    /// Scrape several postings in order
    Many {
        urls: Vec<String>,
        /// File with one URL per line; blank lines and `#` comments are skipped
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        max_items: usize,
    },
    /// Scrape a posting and print only its summary
    Summary { url: String },
    /// Print the guest URL for a job link
    GuestUrl { url: String },
    /// Check whether a link is a recognized job URL
    Validate { url: String },
}

#[derive(Serialize)]
struct Validation<'a> {
    url: &'a str,
    valid: bool,
}

#[derive(Serialize)]
struct GuestLink<'a> {
    url: &'a str,
    guest_url: String,
}

pub async fn handle_job_command(cli: JobCli) -> Result<()> {
    let config = ScraperConfig::load(cli.config.as_deref())?;

    match cli.command {
        JobCommand::One { url } => {
            let scraper = JobScraper::with_chromium(config);
            let record = scraper
                .scrape_one(&url)
                .await
                .with_context(|| format!("Failed to scrape {}", url))?;
            print_json(&record)
        }

        JobCommand::Many {
            urls,
            file,
            max_items,
        } => {
            let urls = collect_urls(urls, file.as_deref())?;
            if urls.is_empty() {
                anyhow::bail!("No URLs given. Pass them as arguments or with --file");
            }

            let scraper = JobScraper::with_chromium(config);
            let report = scraper.scrape_batch(&urls, max_items, None).await?;
            info!(
                "Batch {} finished: {} succeeded, {} failed, {} skipped",
                report.batch_id, report.succeeded, report.failed, report.skipped_over_limit
            );
            print_json(&report)
        }

        JobCommand::Summary { url } => {
            let scraper = JobScraper::with_chromium(config);
            let summary = scraper
                .summarize(&url)
                .await
                .with_context(|| format!("Failed to summarize {}", url))?;
            print_json(&summary)
        }

        JobCommand::GuestUrl { url } => {
            let guest_url = UrlNormalizer::from_config(&config).guest_url(&url)?;
            print_json(&GuestLink { url: &url, guest_url })
        }

        JobCommand::Validate { url } => {
            let valid = UrlNormalizer::from_config(&config).is_job_url(&url);
            print_json(&Validation { url: &url, valid })
        }
    }
}

/// Positional URLs first, then the file's URLs in file order.
pub fn collect_urls(mut urls: Vec<String>, file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
        urls.extend(parse_url_list(&content));
    }
    Ok(urls)
}

fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
