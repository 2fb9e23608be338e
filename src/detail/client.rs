// src/detail/client.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    cookie::Jar,
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER},
    Client,
};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::{
    config::{Settings, USER_AGENT},
    render::BrowserCookie,
};

/// Status and body of one detail page request.
#[derive(Debug, Clone)]
pub struct DetailResponse {
    pub status: u16,
    pub body: String,
}

/// Direct (non-rendering) GET for server-rendered detail pages.
#[async_trait]
pub trait DetailClient: Send + Sync {
    async fn get(&self, url: &Url) -> Result<DetailResponse>;

    /// Take on cookies from a browser session that passed the site's bot
    /// check.
    fn accept_clearance(&self, _cookies: &[BrowserCookie]) {}
}

/// reqwest client dressed up as a desktop browser, with the same user agent
/// as the rendering sessions. Its cookie jar is shared across requests, so
/// clearance cookies loaded once apply to every later fund.
pub struct HttpDetailClient {
    client: Client,
    jar: Arc<Jar>,
    origin: Url,
}

impl HttpDetailClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(referer) = HeaderValue::from_str(&settings.fund_page_url) {
            headers.insert(REFERER, referer);
        }

        let origin = Url::parse(&settings.detail_base_url)
            .with_context(|| format!("parsing detail base {}", settings.detail_base_url))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .gzip(true)
            .timeout(settings.request_timeout)
            .build()
            .context("building detail HTTP client")?;
        Ok(Self {
            client,
            jar,
            origin,
        })
    }
}

#[async_trait]
impl DetailClient for HttpDetailClient {
    async fn get(&self, url: &Url) -> Result<DetailResponse> {
        debug!("Fetching text from {}", url);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .with_context(|| format!("Reading text from {}", url))?;
        Ok(DetailResponse { status, body })
    }

    fn accept_clearance(&self, cookies: &[BrowserCookie]) {
        for cookie in cookies {
            self.jar.add_cookie_str(&cookie.to_header(), &self.origin);
        }
        debug!(cookies = cookies.len(), "loaded browser cookies");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    #[test]
    fn clearance_cookies_are_sent_to_detail_pages() -> Result<()> {
        let client = HttpDetailClient::new(&Settings::default())?;
        client.accept_clearance(&[BrowserCookie {
            name: "cf_clearance".into(),
            value: "token".into(),
            domain: "nepsealpha.com".into(),
            path: "/".into(),
        }]);

        let detail = Url::parse("https://nepsealpha.com/mutual-fund-navs/C30MF?fsk=fs")?;
        let header = client.jar.cookies(&detail).expect("cookie header");
        assert_eq!(header.to_str()?, "cf_clearance=token");
        Ok(())
    }
}
