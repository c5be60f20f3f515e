// src/job_scraper/record_extractor.rs
//! Maps a rendered job page into record fields.
//!
//! Each field walks an ordered strategy table and stops at the first hit.
//! The last strategy for title, company and location reads the document
//! title, which guest pages format as
//! `"{company} hiring {title} in {location} | LinkedIn"`.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::url_normalizer::JobTarget;
use crate::error::{Result, ScrapeError};
use crate::utils::{clean_text, non_empty};

/// Elements that hold the job description. Dismiss clicks stay outside of
/// it and expansion clicks stay inside.
pub const DESCRIPTION_CONTAINER: &str = ".description__text, .show-more-less-html, .jobs-description, .jobs-description__content, .jobs-box__html-content";

const CONTENT_ROOTS: &[&str] = &[
    ".top-card-layout",
    ".decorated-job-posting__details",
    ".jobs-description",
    ".description__text",
    "main",
    "article",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitlePart {
    Title,
    Company,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Css(&'static str),
    PageTitle(TitlePart),
}

use Strategy::{Css, PageTitle};

const TITLE_STRATEGIES: &[Strategy] = &[
    Css("h1.top-card-layout__title"),
    Css(".job-details-jobs-unified-top-card__job-title"),
    Css("h1"),
    PageTitle(TitlePart::Title),
];

const COMPANY_STRATEGIES: &[Strategy] = &[
    Css(".topcard__org-name-link"),
    Css(".job-details-jobs-unified-top-card__company-name"),
    Css("a[href*=\"company\"]"),
    Css(".job-details-jobs-unified-top-card__subtitle-primary-grouping"),
    Css("h4 a"),
    PageTitle(TitlePart::Company),
];

const LOCATION_STRATEGIES: &[Strategy] = &[
    Css(".topcard__flavor--bullet"),
    Css(".job-details-jobs-unified-top-card__bullet"),
    Css("[data-test-id=\"job-location\"]"),
    Css("h4 span"),
    PageTitle(TitlePart::Location),
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".show-more-less-html__more-content",
    ".show-more-less-html__markup",
    ".show-more-less-html__less-content",
    ".jobs-description__content",
    ".jobs-box__html-content",
    ".job-description",
    "[data-job-description]",
    ".description__text",
    "main div[class*=\"description\"]",
    "main div[class*=\"content\"]",
];

const DETAIL_SELECTORS: &[&str] = &[
    ".description__job-criteria-item",
    ".job-details-jobs-unified-top-card__job-insight",
    ".jobs-box__group",
    ".jobs-description__job-criteria-item",
];

// Lines that mark the start of the posting body in plain page text
const SECTION_KEYWORDS: &[&str] = &[
    "minimum qualifications",
    "preferred qualifications",
    "about the job",
    "about the role",
    "responsibilities",
    "requirements",
    "job description",
    "what you'll do",
    "qualifications",
];

const CHROME_PHRASES: &[&str] = &[
    "LinkedIn",
    "로그인",
    "회원가입",
    "Sign in",
    "Join now",
    "Apply",
    "Save",
    "Show more",
    "Show less",
    "©",
    "Accessibility",
    "Privacy Policy",
    "Cookie Policy",
    "User Agreement",
    "Brand Policy",
    "Community Guidelines",
    "Similar jobs",
    "People also viewed",
    "Get notified",
];

const CONTENT_WORDS: &[&str] = &[
    "experience",
    "degree",
    "bachelor",
    "master",
    "phd",
    "years",
    "skills",
    "knowledge",
    "ability",
    "responsible",
    "manage",
    "develop",
    "work",
    "team",
    "project",
];

const MIN_SELECTOR_CHARS: usize = 100;
const MIN_HEURISTIC_CHARS: usize = 200;
const MIN_MAIN_RAW_CHARS: usize = 500;
const MIN_CONTENT_LINE_CHARS: usize = 30;
const MIN_MAIN_LINE_CHARS: usize = 10;

static PAGE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<company>.+?) hiring (?P<title>.+?)(?: in (?P<location>.+?))? \| LinkedIn$")
        .expect("page title pattern is valid")
});

/// Raw fields pulled from one document, before identity and timestamp are attached
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: String,
    pub details: Vec<String>,
    pub page_title: Option<String>,
}

#[derive(Debug, Default)]
struct TitleHints {
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
}

impl TitleHints {
    fn parse(page_title: Option<&str>) -> Self {
        let Some(caps) = page_title.and_then(|t| PAGE_TITLE.captures(t)) else {
            return Self::default();
        };
        let part = |name: &str| caps.name(name).and_then(|m| non_empty(clean_text(m.as_str())));
        Self {
            title: part("title"),
            company: part("company"),
            location: part("location"),
        }
    }

    fn get(&self, part: TitlePart) -> Option<String> {
        match part {
            TitlePart::Title => self.title.clone(),
            TitlePart::Company => self.company.clone(),
            TitlePart::Location => self.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordExtractor;

impl RecordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Fails only when the document has no job content root at all.
    /// A `description` already settled by expansion is used as is.
    pub fn extract(
        &self,
        html: &str,
        target: &JobTarget,
        description: Option<String>,
    ) -> Result<ExtractedFields> {
        let document = Html::parse_document(html);

        if !CONTENT_ROOTS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .any(|selector| document.select(&selector).next().is_some())
        {
            warn!("No job content found on {}", target.guest_url);
            return Err(ScrapeError::extraction(
                &target.guest_url,
                "job content container not found in document",
            ));
        }

        let page_title = Self::page_title(&document);
        let hints = TitleHints::parse(page_title.as_deref());

        let fields = ExtractedFields {
            title: Self::first_match(&document, TITLE_STRATEGIES, &hints),
            company: Self::first_match(&document, COMPANY_STRATEGIES, &hints),
            location: Self::first_match(&document, LOCATION_STRATEGIES, &hints),
            description: description.unwrap_or_else(|| Self::description_of(&document)),
            details: Self::details(&document),
            page_title,
        };

        debug!(
            "Extracted job {}: title={:?}, company={:?}, {} description chars",
            target.job_id,
            fields.title,
            fields.company,
            fields.description.chars().count()
        );
        Ok(fields)
    }

    /// Description text alone, used to measure expansion.
    pub fn description(&self, html: &str) -> String {
        Self::description_of(&Html::parse_document(html))
    }

    fn page_title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        let element = document.select(&selector).next()?;
        non_empty(clean_text(&element.text().collect::<String>()))
    }

    fn first_match(document: &Html, strategies: &[Strategy], hints: &TitleHints) -> Option<String> {
        strategies.iter().find_map(|strategy| match strategy {
            Css(selector) => Self::find_text_by_selector(document, selector),
            PageTitle(part) => hints.get(*part),
        })
    }

    fn find_text_by_selector(document: &Html, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        let element = document.select(&selector).next()?;
        non_empty(clean_text(&element.text().collect::<Vec<_>>().join(" ")))
    }

    fn description_of(document: &Html) -> String {
        let candidates: Vec<(&str, String)> = DESCRIPTION_SELECTORS
            .iter()
            .filter_map(|s| {
                let selector = Selector::parse(s).ok()?;
                let element = document.select(&selector).next()?;
                Some((*s, text_lines(element).join("\n")))
            })
            .collect();

        if let Some((selector, text)) = candidates
            .iter()
            .find(|(_, text)| text.chars().count() > MIN_SELECTOR_CHARS)
        {
            debug!("Found description with selector {}", selector);
            return text.clone();
        }

        if let Some(text) = Self::keyword_section(document) {
            debug!("Found description from page text heuristics");
            return text;
        }

        if let Some(text) = Self::main_fallback(document) {
            debug!("Found description from main element fallback");
            return text;
        }

        candidates
            .into_iter()
            .map(|(_, text)| text)
            .find(|text| !text.is_empty())
            .unwrap_or_default()
    }

    fn keyword_section(document: &Html) -> Option<String> {
        let mut in_section = false;
        let mut kept = Vec::new();

        for line in text_lines(document.root_element()) {
            let lower = line.to_lowercase();
            if SECTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
                in_section = true;
            }
            if CHROME_PHRASES.iter().any(|p| line.contains(p)) {
                continue;
            }
            let looks_like_content = line.chars().count() > MIN_CONTENT_LINE_CHARS
                && CONTENT_WORDS.iter().any(|w| lower.contains(w));
            if in_section || looks_like_content {
                kept.push(line);
            }
        }

        let text = kept.join(" ");
        (text.chars().count() > MIN_HEURISTIC_CHARS).then_some(text)
    }

    fn main_fallback(document: &Html) -> Option<String> {
        let selector = Selector::parse("main").ok()?;
        let main = document.select(&selector).next()?;
        let lines = text_lines(main);
        if lines.iter().map(|l| l.chars().count()).sum::<usize>() <= MIN_MAIN_RAW_CHARS {
            return None;
        }

        let text = lines
            .into_iter()
            .filter(|l| l.chars().count() > MIN_MAIN_LINE_CHARS)
            .collect::<Vec<_>>()
            .join(" ");
        (text.chars().count() > MIN_HEURISTIC_CHARS).then_some(text)
    }

    fn details(document: &Html) -> Vec<String> {
        let mut seen = HashSet::new();
        DETAIL_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .flat_map(|selector| {
                document
                    .select(&selector)
                    .map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
                    .collect::<Vec<_>>()
            })
            .filter(|text| !text.is_empty() && seen.insert(text.clone()))
            .collect()
    }
}

/// Visible text of `root`, one cleaned line per text run, skipping scripts.
fn text_lines(root: ElementRef) -> Vec<String> {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            match parent.value().name() {
                "script" | "style" | "noscript" | "template" | "title" => None,
                _ => Some(text.to_string()),
            }
        })
        .flat_map(|text| text.lines().map(clean_text).collect::<Vec<_>>())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> JobTarget {
        JobTarget {
            source_url: "https://www.linkedin.com/jobs/view/4267053111/".to_string(),
            guest_url: "https://www.linkedin.com/jobs-guest/jobs/view/4267053111/".to_string(),
            job_id: "4267053111".to_string(),
        }
    }

    const BODY: &str = "We are looking for a backend engineer to design and operate \
        high-throughput services. You will own APIs end to end and mentor teammates.";

    fn guest_page() -> String {
        format!(
            r#"<html><head><title>Acme Corp hiring Backend Engineer in Seoul, South Korea | LinkedIn</title></head>
            <body><main>
              <section class="top-card-layout">
                <h1 class="top-card-layout__title">  Backend
                   Engineer </h1>
                <a class="topcard__org-name-link" href="/company/acme">Acme Corp</a>
                <span class="topcard__flavor--bullet">Seoul, South Korea</span>
              </section>
              <div class="description__text">
                <div class="show-more-less-html__markup">
                  <p>About the role</p>
                  <p>{BODY}</p>
                </div>
                <button class="show-more-less-html__button--more">Show more</button>
              </div>
              <ul>
                <li class="description__job-criteria-item">Seniority level
                  Mid-Senior level</li>
                <li class="description__job-criteria-item">Employment type Full-time</li>
                <li class="jobs-box__group">Employment type Full-time</li>
              </ul>
            </main>
            <script>var tracking = "Sign in";</script>
            </body></html>"#
        )
    }

    #[test]
    fn test_guest_page_fields() {
        let fields = RecordExtractor::new().extract(&guest_page(), &target(), None).unwrap();

        assert_eq!(fields.title.as_deref(), Some("Backend Engineer"));
        assert_eq!(fields.company.as_deref(), Some("Acme Corp"));
        assert_eq!(fields.location.as_deref(), Some("Seoul, South Korea"));
        assert_eq!(
            fields.page_title.as_deref(),
            Some("Acme Corp hiring Backend Engineer in Seoul, South Korea | LinkedIn")
        );
        assert!(fields.description.starts_with("About the role\nWe are looking"));
        assert_eq!(
            fields.details,
            vec![
                "Seniority level Mid-Senior level".to_string(),
                "Employment type Full-time".to_string()
            ]
        );
    }

    #[test]
    fn test_page_title_is_last_resort() {
        let html = r#"<html><head><title>Globex hiring Data Analyst in Berlin | LinkedIn</title></head>
            <body><main><p>Short</p></main></body></html>"#;
        let fields = RecordExtractor::new().extract(html, &target(), None).unwrap();

        assert_eq!(fields.title.as_deref(), Some("Data Analyst"));
        assert_eq!(fields.company.as_deref(), Some("Globex"));
        assert_eq!(fields.location.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let html = "<html><head><title>Job</title></head><body><article><p>Hello</p></article></body></html>";
        let fields = RecordExtractor::new().extract(html, &target(), None).unwrap();

        assert_eq!(fields.title, None);
        assert_eq!(fields.company, None);
        assert_eq!(fields.location, None);
        assert_eq!(fields.description, "");
        assert!(fields.details.is_empty());
    }

    #[test]
    fn test_settled_description_overrides_document() {
        let fields = RecordExtractor::new()
            .extract(&guest_page(), &target(), Some("Expanded text".to_string()))
            .unwrap();
        assert_eq!(fields.description, "Expanded text");
        assert!(fields.title.is_some());
    }

    #[test]
    fn test_missing_content_root_is_extraction_error() {
        let html = "<html><body><div class='authwall'>Sign in to continue</div></body></html>";
        let err = RecordExtractor::new().extract(html, &target(), None).unwrap_err();
        assert!(matches!(err, ScrapeError::Extraction { .. }));
    }

    #[test]
    fn test_short_selector_match_is_kept_when_nothing_better() {
        let html = r#"<main><div class="description__text">Remote friendly role.</div></main>"#;
        let description = RecordExtractor::new().description(html);
        assert_eq!(description, "Remote friendly role.");
    }

    #[test]
    fn test_keyword_heuristic_over_page_text() {
        let html = r#"<body><article>
            <p>Sign in to see more</p>
            <p>Responsibilities</p>
            <p>Design, build and operate distributed data pipelines for analytics.</p>
            <p>Collaborate with product managers on roadmap and delivery.</p>
            <p>Requirements</p>
            <p>5+ years of experience with Rust, Go or C++ in production systems.</p>
            <p>Strong knowledge of SQL and columnar storage formats.</p>
            <p>Apply now</p>
        </article></body>"#;
        let description = RecordExtractor::new().description(html);

        assert!(description.starts_with("Responsibilities Design, build"));
        assert!(description.contains("columnar storage formats."));
        assert!(!description.contains("Sign in"));
        assert!(!description.contains("Apply now"));
    }

    #[test]
    fn test_main_fallback_drops_short_lines() {
        let long = "Our platform crew keeps hundreds of services running smoothly every day.";
        let paragraphs = (0..8).map(|_| format!("<p>{}</p>", long)).collect::<String>();
        let html = format!("<body><main><span>Tags</span>{}</main></body>", paragraphs);

        let description = RecordExtractor::new().description(&html);
        assert!(description.starts_with(long));
        assert!(!description.contains("Tags"));
    }

    #[test]
    fn test_title_hints_without_location() {
        let hints = TitleHints::parse(Some("Initech hiring QA Lead | LinkedIn"));
        assert_eq!(hints.company.as_deref(), Some("Initech"));
        assert_eq!(hints.title.as_deref(), Some("QA Lead"));
        assert_eq!(hints.location, None);

        let none = TitleHints::parse(Some("Some unrelated page"));
        assert!(none.title.is_none());
    }
}
