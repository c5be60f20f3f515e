// src/browser/chromium.rs
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserEngine, BrowserPage, ClickTarget};
use crate::config::BrowserSettings;
use crate::error::{PageError, PageResult, Result, ScrapeError};

const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-plugins",
];

const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
"#;

const CLICK_SCRIPT: &str = r#"
(() => {
  const t = __TARGET__;
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  const visible = (el) => {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
  };
  try {
    for (const el of document.querySelectorAll(t.selector)) {
      if (!visible(el)) continue;
      if (t.text !== null && norm(el.innerText) !== norm(t.text)) continue;
      if (t.within !== null && !el.closest(t.within)) continue;
      if (t.outside !== null && el.closest(t.outside)) continue;
      el.click();
      return true;
    }
  } catch (e) {
    return false;
  }
  return false;
})()
"#;

/// Launches one headless Chromium per session through the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    settings: BrowserSettings,
}

impl ChromiumEngine {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.settings.window_width, self.settings.window_height);

        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }
        if self.settings.disable_images {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }
        for arg in &self.settings.extra_args {
            builder = builder.arg(arg.as_str());
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.settings.executable {
            builder = builder.chrome_executable(executable);
        }

        // build() fails when no Chrome executable can be located
        builder.build().map_err(ScrapeError::EngineUnavailable)
    }
}

fn launch_error(err: CdpError) -> ScrapeError {
    match err {
        CdpError::LaunchIo(..) | CdpError::LaunchExit(..) | CdpError::LaunchTimeout(..) => {
            ScrapeError::EngineUnavailable(err.to_string())
        }
        other => ScrapeError::Session(format!("browser launch failed: {}", other)),
    }
}

fn page_error(err: CdpError) -> PageError {
    match err {
        CdpError::Timeout => PageError::Timeout,
        other => PageError::Protocol(other.to_string()),
    }
}

fn spawn_handler(mut handler: Handler) -> HandlerGuard {
    HandlerGuard(tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("chromium handler event error: {}", e);
            }
        }
    }))
}

/// Aborts the CDP handler task on drop, including a launch cancelled halfway.
struct HandlerGuard(JoinHandle<()>);

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>> {
        let config = self.browser_config()?;
        let (mut browser, handler) = Browser::launch(config).await.map_err(launch_error)?;
        let handler = spawn_handler(handler);

        let page = match prepare_page(&browser, &self.settings.user_agent).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                return Err(e);
            }
        };

        info!("Launched headless browser");
        Ok(Box::new(ChromiumPage {
            browser: Mutex::new(browser),
            page,
            handler,
        }))
    }
}

async fn prepare_page(browser: &Browser, user_agent: &str) -> Result<Page> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| ScrapeError::Session(format!("failed to open page: {}", e)))?;

    page.set_user_agent(user_agent)
        .await
        .map_err(|e| ScrapeError::Session(format!("failed to set user agent: {}", e)))?;

    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
        .await
        .map_err(|e| ScrapeError::Session(format!("failed to inject init script: {}", e)))?;

    Ok(page)
}

pub struct ChromiumPage {
    browser: Mutex<Browser>,
    page: Page,
    handler: HandlerGuard,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str) -> PageResult<()> {
        self.page.goto(url).await.map_err(page_error)?;
        Ok(())
    }

    async fn content(&self) -> PageResult<String> {
        self.page.content().await.map_err(page_error)
    }

    async fn click_visible(&self, target: &ClickTarget) -> PageResult<bool> {
        let encoded = serde_json::to_string(target)
            .map_err(|e| PageError::Protocol(format!("unencodable click target: {}", e)))?;
        let script = CLICK_SCRIPT.replace("__TARGET__", &encoded);

        let result = self.page.evaluate(script).await.map_err(page_error)?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }

    async fn close(self: Box<Self>) -> PageResult<()> {
        let ChromiumPage {
            browser,
            page,
            handler,
        } = *self;
        let mut browser = browser.into_inner();

        if let Err(e) = page.close().await {
            debug!("Page close failed, closing browser anyway: {}", e);
        }
        let closed = browser.close().await.map(|_| ()).map_err(page_error);
        if let Err(e) = browser.wait().await {
            warn!("Waiting for browser exit failed: {}", e);
        }
        drop(handler);
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_script_embeds_escaped_target() {
        let target = ClickTarget::css("button[aria-label=\"Close\"]").outside(".description");
        let encoded = serde_json::to_string(&target).unwrap();
        let script = CLICK_SCRIPT.replace("__TARGET__", &encoded);

        assert!(script.contains(r#""selector":"button[aria-label=\"Close\"]""#));
        assert!(script.contains(r#""text":null"#));
        assert!(script.contains(r#""outside":".description""#));
        assert!(!script.contains("__TARGET__"));
    }

    #[tokio::test]
    async fn test_dropped_handler_guard_aborts_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let guard = HandlerGuard(tokio::spawn(async move {
            let _keep = tx;
            std::future::pending::<()>().await;
        }));

        drop(guard);
        // the sender is dropped once the aborted task is torn down
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_live_handler_guard_keeps_task_running() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let _guard = HandlerGuard(tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = tx.send(());
        }));

        assert!(rx.await.is_ok());
    }

    #[test]
    fn test_timeouts_map_to_page_timeout() {
        assert!(matches!(page_error(CdpError::Timeout), PageError::Timeout));
    }
}
