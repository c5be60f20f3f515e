// src/job_scraper/interference.rs
//! Dismisses sign-in walls, cookie banners and other overlays that sit on
//! top of a guest job page. Never touches the description container.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::record_extractor::DESCRIPTION_CONTAINER;
use crate::browser::{BrowserSession, ClickTarget};
use crate::config::ScraperConfig;

/// Overlays dismissed in a single pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DismissReport {
    pub dismissed: Vec<String>,
    /// Close actions that raised an error and were skipped
    pub failed: Vec<String>,
}

impl DismissReport {
    pub fn is_noop(&self) -> bool {
        self.dismissed.is_empty() && self.failed.is_empty()
    }
}

pub struct InterferenceHandler {
    popup_wait: Duration,
    dismiss_settle: Duration,
    targets: Vec<ClickTarget>,
}

impl InterferenceHandler {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            popup_wait: Duration::from_millis(config.popup_wait_ms),
            dismiss_settle: Duration::from_millis(config.dismiss_settle_ms),
            targets: Self::overlay_targets(),
        }
    }

    /// Close actions in priority order
    pub fn overlay_targets() -> Vec<ClickTarget> {
        [
            ClickTarget::css("button[aria-label=\"Close\"]"),
            ClickTarget::css("button[aria-label=\"닫기\"]"),
            ClickTarget::css(".contextual-sign-in-modal__modal-dismiss"),
            ClickTarget::css(".modal__dismiss"),
            ClickTarget::css("button").with_text("Close"),
            ClickTarget::css("button").with_text("닫기"),
            ClickTarget::css(".modal button[type=\"button\"]"),
            ClickTarget::css("[role=\"dialog\"] button"),
        ]
        .into_iter()
        .map(|target| target.outside(DESCRIPTION_CONTAINER))
        .collect()
    }

    /// One pass over the signatures. A page without overlays is a no-op.
    pub async fn dismiss(&self, session: &BrowserSession) -> DismissReport {
        tokio::time::sleep(self.popup_wait).await;

        let mut report = DismissReport::default();
        for target in &self.targets {
            match session.click_visible(target).await {
                Ok(true) => {
                    info!(session = session.id(), "Closed popup with selector: {}", target.describe());
                    report.dismissed.push(target.describe());
                    tokio::time::sleep(self.dismiss_settle).await;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(session = session.id(), "Popup close via {} failed: {}", target.describe(), e);
                    report.failed.push(target.describe());
                }
            }
        }

        if report.is_noop() {
            debug!(session = session.id(), "No overlays to dismiss");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{NavigationPolicy, SessionPool};
    use crate::testing::{MockEngine, MockSite};
    use std::sync::Arc;

    const URL: &str = "https://www.linkedin.com/jobs-guest/jobs/view/42/";

    const DESCRIPTION: &str = r#"<div class="description__text"><p>About the role</p>
        <button aria-label="Close">Close</button></div>"#;

    async fn dismiss_on(site: MockSite) -> (MockEngine, DismissReport, String) {
        let engine = MockEngine::new().with_site(URL, site);
        let pool = SessionPool::new(Arc::new(engine.clone()));
        let config = ScraperConfig::without_delays();

        let mut session = pool.acquire().await.unwrap();
        session
            .navigate(URL, &NavigationPolicy::from_config(&config))
            .await
            .unwrap();
        let report = InterferenceHandler::new(&config).dismiss(&session).await;
        let html = session.snapshot().await.unwrap();
        session.release().await;
        (engine, report, html)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_modal_is_dismissed() {
        let before = format!(
            r#"<div class="modal" role="dialog"><button aria-label="Close" class="modal__dismiss">×</button></div><main>{}</main>"#,
            DESCRIPTION
        );
        let after = format!("<main>{}</main>", DESCRIPTION);
        let site = MockSite::new(before).on_click("button[aria-label=\"Close\"]", after.clone());

        let (engine, report, html) = dismiss_on(site).await;

        assert_eq!(report.dismissed, vec!["button[aria-label=\"Close\"]".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(engine.clicks().len(), 1);
        assert_eq!(html, after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_overlay_is_noop() {
        let (engine, report, html) =
            dismiss_on(MockSite::new(format!("<main>{}</main>", DESCRIPTION))).await;

        assert!(report.is_noop());
        assert!(engine.clicks().is_empty());
        assert!(html.contains("About the role"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_signature_and_dialog_fallback() {
        let before = format!(
            r#"<div role="dialog"><p>Join now</p><button>Close</button></div><main>{}</main>"#,
            DESCRIPTION
        );
        let (_, report, _) = dismiss_on(MockSite::new(before)).await;

        // Without a scripted transition the dialog stays, so every matching
        // signature gets its click.
        assert_eq!(
            report.dismissed,
            vec![
                "button [text=\"Close\"]".to_string(),
                "[role=\"dialog\"] button".to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_popup_wait_and_settle_are_applied() {
        let before = r#"<div class="modal__dismiss"></div><main><p>Body</p></main>"#;
        let engine = MockEngine::new().with_site(URL, MockSite::new(before));
        let pool = SessionPool::new(Arc::new(engine));
        let config = ScraperConfig {
            popup_wait_ms: 1_000,
            dismiss_settle_ms: 500,
            ..ScraperConfig::without_delays()
        };

        let mut session = pool.acquire().await.unwrap();
        session
            .navigate(URL, &NavigationPolicy::from_config(&config))
            .await
            .unwrap();

        let start = tokio::time::Instant::now();
        let report = InterferenceHandler::new(&config).dismiss(&session).await;
        assert_eq!(report.dismissed.len(), 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_500) && elapsed < Duration::from_millis(1_600));
        session.release().await;
    }
}
