//! Headless Chromium sessions via chromiumoxide.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::{BrowserCookie, RenderSession, SessionLauncher};
use crate::config::{Settings, USER_AGENT};
use crate::error::RenderError;

/// Locate a Chrome/Chromium binary: `NAVSCRAPER_CHROME_PATH`, then `PATH`.
/// `None` leaves detection to chromiumoxide.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("NAVSCRAPER_CHROME_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|bin| which::which(bin).ok())
}

/// chromiumoxide's default switches minus `--enable-automation`, which marks
/// the browser as automated to the page.
const BROWSER_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--enable-features=NetworkService,NetworkServiceInProcess",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-extensions-with-background-pages",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--force-color-profile=srgb",
    "--metrics-recording-only",
    "--no-first-run",
    "--password-store=basic",
    "--use-mock-keychain",
    "--lang=en_US",
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
];

fn launch_args() -> Vec<String> {
    BROWSER_ARGS
        .iter()
        .map(|a| a.to_string())
        .chain(std::iter::once(format!("--user-agent={USER_AGENT}")))
        .collect()
}

/// Launches one headless Chromium per session.
pub struct ChromiumLauncher {
    navigation_timeout: Duration,
    settle_delay: Duration,
    control_timeout: Duration,
    poll_interval: Duration,
}

impl ChromiumLauncher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            navigation_timeout: settings.page_load_timeout,
            settle_delay: settings.settle_delay,
            control_timeout: settings.control_timeout,
            poll_interval: settings.poll_interval,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        // chromiumoxide's 30s request default would cut navigation short of
        // the page load budget.
        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .no_sandbox()
            .window_size(1920, 1080)
            .request_timeout(self.navigation_timeout)
            .disable_default_args()
            .args(launch_args());
        if let Some(path) = find_chromium() {
            debug!(chrome = %path.display(), "using chromium binary");
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // CDP events must be drained for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(RenderError::Launch(format!("failed to create page: {e}")));
            }
        };
        info!("browser session started");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            settle_delay: self.settle_delay,
            control_timeout: self.control_timeout,
            poll_interval: self.poll_interval,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    settle_delay: Duration,
    control_timeout: Duration,
    poll_interval: Duration,
}

impl ChromiumSession {
    /// Poll until `selector` matches or `timeout` passes.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), RenderError> {
        let start = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(RenderError::Timeout {
                    what: selector.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, RenderError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| RenderError::Script(e.to_string()))
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn open(
        &mut self,
        url: &str,
        anchor_id: &str,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        let start = Instant::now();
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(RenderError::Browser(format!("navigation failed: {e}"))),
            Err(_) => {
                return Err(RenderError::Timeout {
                    what: format!("navigation to {url}"),
                    secs: timeout.as_secs(),
                })
            }
        }
        let remaining = timeout.saturating_sub(start.elapsed());
        self.wait_for(&format!("#{anchor_id}"), remaining).await?;
        debug!(url, elapsed = ?start.elapsed(), "page ready");
        Ok(())
    }

    async fn activate_section(&mut self, tab_href: &str) -> Result<(), RenderError> {
        let selector = format!("a[href='{tab_href}']");
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
            js_string(&selector)
        );
        if !self.eval::<bool>(script).await? {
            return Err(RenderError::ElementNotFound(selector));
        }
        sleep(self.settle_delay).await;
        Ok(())
    }

    async fn select_page_size(
        &mut self,
        control_name: &str,
        size: u32,
    ) -> Result<(), RenderError> {
        let selector = format!("[name='{control_name}']");
        self.wait_for(&selector, self.control_timeout).await?;

        let script = format!(
            "(() => {{ \
               const el = document.querySelector({sel}); \
               if (!el) return 'missing'; \
               const v = {val}; \
               if (!Array.from(el.options || []).some(o => o.value === v)) return 'no-option'; \
               el.value = v; \
               el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
               return 'ok'; \
             }})()",
            sel = js_string(&selector),
            val = js_string(&size.to_string()),
        );
        match self.eval::<String>(script).await?.as_str() {
            "ok" => {}
            "no-option" => {
                return Err(RenderError::ElementNotFound(format!(
                    "option {size} in {selector}"
                )))
            }
            _ => return Err(RenderError::ElementNotFound(selector)),
        }
        sleep(self.settle_delay).await;
        Ok(())
    }

    async fn current_markup(&mut self) -> Result<String, RenderError> {
        self.page
            .content()
            .await
            .map_err(|e| RenderError::Browser(e.to_string()))
    }

    async fn current_url(&mut self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn title(&mut self) -> Option<String> {
        self.page.get_title().await.ok().flatten()
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, RenderError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| RenderError::Browser(e.to_string()))?;
        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        let mut this = *self;
        let closed = this
            .browser
            .close()
            .await
            .map_err(|e| RenderError::Browser(e.to_string()));
        let _ = this.browser.wait().await;
        this.handler_task.abort();
        info!("browser session closed");
        closed.map(|_| ())
    }
}
