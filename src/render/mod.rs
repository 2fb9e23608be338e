//! Browser session abstraction for JavaScript-rendered pages.
//!
//! `RenderSession` is what the scrapers drive; `chromium` implements it on
//! top of chromiumoxide. A session owns one browser for its whole life and
//! must be handed back through `close`.

pub mod chromium;

use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::RenderError;

/// Characters of markup logged when a page fails to open.
const DIAGNOSTIC_MARKUP_CHARS: usize = 1000;

/// A cookie held by the browser, for handing a cleared session to a
/// direct HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl BrowserCookie {
    /// `Set-Cookie` form, for loading into a cookie jar.
    pub fn to_header(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, path
        )
    }
}

/// Creates browser sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// One exclusive browser session.
#[async_trait]
pub trait RenderSession: Send {
    /// Navigate to `url` and block until `#anchor_id` exists or `timeout`
    /// elapses.
    async fn open(&mut self, url: &str, anchor_id: &str, timeout: Duration)
        -> Result<(), RenderError>;

    /// Programmatically click the tab link `a[href='<tab_href>']`, then let
    /// the page settle.
    async fn activate_section(&mut self, tab_href: &str) -> Result<(), RenderError>;

    /// Set the `<select name=control_name>` page-length control to `size`,
    /// then let the page settle.
    async fn select_page_size(&mut self, control_name: &str, size: u32)
        -> Result<(), RenderError>;

    async fn current_markup(&mut self) -> Result<String, RenderError>;

    async fn current_url(&mut self) -> Option<String>;

    async fn title(&mut self) -> Option<String>;

    /// Cookies the browser holds for the current page.
    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, RenderError>;

    /// Release the browser.
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

/// Close a session, logging rather than propagating a failed shutdown.
pub async fn release(session: Box<dyn RenderSession>) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close browser session");
    }
}

/// Log where the browser ended up, for diagnosing a page that never
/// rendered.
pub async fn log_diagnostics(session: &mut dyn RenderSession) {
    let url = session.current_url().await.unwrap_or_default();
    let title = session.title().await.unwrap_or_default();
    let snippet: String = match session.current_markup().await {
        Ok(markup) => markup.chars().take(DIAGNOSTIC_MARKUP_CHARS).collect(),
        Err(e) => format!("<markup unavailable: {e}>"),
    };
    error!(current_url = %url, page_title = %title, "page source snippet:\n{}", snippet);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_defaults_path() {
        let cookie = BrowserCookie {
            name: "cf_clearance".into(),
            value: "abc".into(),
            domain: ".nepsealpha.com".into(),
            path: String::new(),
        };
        assert_eq!(
            cookie.to_header(),
            "cf_clearance=abc; Domain=.nepsealpha.com; Path=/"
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex},
    };

    /// Scripted browser state shared between a `FakeLauncher` and the
    /// sessions it hands out.
    #[derive(Default)]
    pub struct FakeState {
        pub launch_fails: bool,
        pub open_fails: bool,
        /// URLs whose `open` fails; `open_fails` fails every URL.
        pub failing_urls: HashSet<String>,
        /// Markup shown after `open`.
        pub landing_markup: String,
        /// Markup shown after clicking each tab; tabs not listed are missing.
        pub tabs: HashMap<String, String>,
        pub missing_controls: HashSet<String>,
        pub current: String,
        pub opened: Vec<String>,
        pub page_sizes: Vec<(String, u32)>,
        pub cookies: Vec<BrowserCookie>,
        pub launched: usize,
        pub closed: usize,
    }

    #[derive(Clone, Default)]
    pub struct FakeLauncher {
        pub state: Arc<Mutex<FakeState>>,
    }

    impl FakeLauncher {
        pub fn with(state: FakeState) -> Self {
            Self {
                state: Arc::new(Mutex::new(state)),
            }
        }

        pub fn closed(&self) -> usize {
            self.state.lock().unwrap().closed
        }

        pub fn launched(&self) -> usize {
            self.state.lock().unwrap().launched
        }
    }

    pub struct FakeSession {
        state: Arc<Mutex<FakeState>>,
    }

    #[async_trait]
    impl SessionLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError> {
            let mut st = self.state.lock().unwrap();
            if st.launch_fails {
                return Err(RenderError::Launch("no chromium binary".into()));
            }
            st.launched += 1;
            Ok(Box::new(FakeSession {
                state: Arc::clone(&self.state),
            }))
        }
    }

    #[async_trait]
    impl RenderSession for FakeSession {
        async fn open(
            &mut self,
            url: &str,
            anchor_id: &str,
            timeout: Duration,
        ) -> Result<(), RenderError> {
            let mut st = self.state.lock().unwrap();
            st.opened.push(url.to_string());
            if st.open_fails || st.failing_urls.contains(url) {
                st.current = "<html><title>Just a moment...</title></html>".into();
                return Err(RenderError::Timeout {
                    what: format!("#{anchor_id}"),
                    secs: timeout.as_secs(),
                });
            }
            st.current = st.landing_markup.clone();
            Ok(())
        }

        async fn activate_section(&mut self, tab_href: &str) -> Result<(), RenderError> {
            let mut st = self.state.lock().unwrap();
            match st.tabs.get(tab_href).cloned() {
                Some(markup) => {
                    st.current = markup;
                    Ok(())
                }
                None => Err(RenderError::ElementNotFound(format!("a[href='{tab_href}']"))),
            }
        }

        async fn select_page_size(
            &mut self,
            control_name: &str,
            size: u32,
        ) -> Result<(), RenderError> {
            let mut st = self.state.lock().unwrap();
            if st.missing_controls.contains(control_name) {
                return Err(RenderError::ElementNotFound(format!("[name='{control_name}']")));
            }
            st.page_sizes.push((control_name.to_string(), size));
            Ok(())
        }

        async fn current_markup(&mut self) -> Result<String, RenderError> {
            Ok(self.state.lock().unwrap().current.clone())
        }

        async fn current_url(&mut self) -> Option<String> {
            self.state.lock().unwrap().opened.last().cloned()
        }

        async fn title(&mut self) -> Option<String> {
            Some("Just a moment...".into())
        }

        async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, RenderError> {
            Ok(self.state.lock().unwrap().cookies.clone())
        }

        async fn close(self: Box<Self>) -> Result<(), RenderError> {
            self.state.lock().unwrap().closed += 1;
            Ok(())
        }
    }
}
