// src/detail/challenge.rs
//
// Bot-mitigation interstitials in front of the detail pages. A challenged
// request is cleared once in a real browser, whose cookies then ride along
// on the direct client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use super::client::{DetailClient, DetailResponse};
use crate::{
    config::{Settings, FUND_PAGE_ANCHOR},
    render::{release, BrowserCookie, SessionLauncher},
};

/// Body fragments of the interstitial pages served instead of content.
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-chl",
    "cf_chl_opt",
    "challenge-platform",
    "Just a moment...",
    "Attention Required!",
];

/// Whether a response is a bot challenge rather than an answer.
pub fn is_challenge(resp: &DetailResponse) -> bool {
    matches!(resp.status, 403 | 429 | 503)
        && CHALLENGE_MARKERS.iter().any(|m| resp.body.contains(m))
}

/// Gets past the site's bot check and returns the cookies proving it.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self) -> Result<Vec<BrowserCookie>>;
}

/// Clears the challenge by rendering the fund page in a browser session.
pub struct BrowserSolver {
    launcher: Box<dyn SessionLauncher>,
    page_url: String,
    timeout: Duration,
}

impl BrowserSolver {
    pub fn new(launcher: Box<dyn SessionLauncher>, settings: &Settings) -> Self {
        Self {
            launcher,
            page_url: settings.fund_page_url.clone(),
            timeout: settings.page_load_timeout,
        }
    }
}

#[async_trait]
impl ChallengeSolver for BrowserSolver {
    async fn solve(&self) -> Result<Vec<BrowserCookie>> {
        let mut session = self
            .launcher
            .launch()
            .await
            .context("launching browser for challenge")?;
        let cookies = match session
            .open(&self.page_url, FUND_PAGE_ANCHOR, self.timeout)
            .await
        {
            Ok(()) => session.cookies().await,
            Err(e) => Err(e),
        };
        release(session).await;
        cookies.with_context(|| format!("clearing challenge at {}", self.page_url))
    }
}

/// A `DetailClient` that negotiates challenges for the client it wraps.
///
/// On a challenge page it solves once, hands the cookies to the inner
/// client and repeats the request. After a failed negotiation, later
/// challenges are returned as they are.
pub struct NegotiatingClient<C> {
    inner: C,
    solver: Box<dyn ChallengeSolver>,
    gave_up: AtomicBool,
}

impl<C: DetailClient> NegotiatingClient<C> {
    pub fn new(inner: C, solver: Box<dyn ChallengeSolver>) -> Self {
        Self {
            inner,
            solver,
            gave_up: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: DetailClient> DetailClient for NegotiatingClient<C> {
    async fn get(&self, url: &Url) -> Result<DetailResponse> {
        let resp = self.inner.get(url).await?;
        if !is_challenge(&resp) || self.gave_up.load(Ordering::Relaxed) {
            return Ok(resp);
        }

        info!(%url, status = resp.status, "bot challenge, clearing in browser");
        let cookies = match self.solver.solve().await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "could not clear bot challenge");
                self.gave_up.store(true, Ordering::Relaxed);
                return Ok(resp);
            }
        };
        self.inner.accept_clearance(&cookies);

        let retried = self.inner.get(url).await?;
        if is_challenge(&retried) {
            warn!(%url, "still challenged after clearance");
            self.gave_up.store(true, Ordering::Relaxed);
        }
        Ok(retried)
    }

    fn accept_clearance(&self, cookies: &[BrowserCookie]) {
        self.inner.accept_clearance(cookies);
    }
}
