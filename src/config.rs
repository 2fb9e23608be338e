// src/config.rs

use chrono::{Local, NaiveDate};
use std::{env, fmt, path::PathBuf, time::Duration};

/// Main fund page with the tabbed DataTables.
pub const FUND_PAGE_URL: &str = "https://nepsealpha.com/mutual-fund-navs";
/// Element that signals the fund page has rendered.
pub const FUND_PAGE_ANCHOR: &str = "home";

pub const DEBENTURE_PAGE_URL: &str = "https://nepsealpha.com/debenture";
pub const DEBENTURE_TABLE_ID: &str = "DataTables_Table_0";
pub const DEBENTURE_LENGTH_CONTROL: &str = "DataTables_Table_0_length";
pub const DEBENTURE_ARTIFACT: &str = "debenture-sastoshare";

/// Per-fund detail pages live under this path, keyed by symbol.
pub const DETAIL_BASE_URL: &str = "https://nepsealpha.com/mutual-fund-navs/";

pub const FAILURE_LOG_NAME: &str = "scraping_errors.log";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Knobs for one pipeline run. `Default` carries the production values;
/// tests shrink the delays.
#[derive(Debug, Clone)]
pub struct Settings {
    pub fund_page_url: String,
    pub debenture_page_url: String,
    pub detail_base_url: String,
    pub out_dir: PathBuf,
    /// How long `open` waits for the anchor element.
    pub page_load_timeout: Duration,
    /// How long to wait for the page-length `<select>` to appear.
    pub control_timeout: Duration,
    /// Pause after every tab click / page-size change.
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    /// Largest value the DataTables length control accepts.
    pub page_size: u32,
    /// Soft ceiling for the detail batch, checked between funds.
    pub time_budget: Duration,
    pub request_timeout: Duration,
    /// Politeness pause after each detail response.
    pub pacing_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fund_page_url: FUND_PAGE_URL.to_string(),
            debenture_page_url: DEBENTURE_PAGE_URL.to_string(),
            detail_base_url: DETAIL_BASE_URL.to_string(),
            out_dir: PathBuf::from("."),
            page_load_timeout: Duration::from_secs(60),
            control_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
            page_size: 100,
            // 9m30s, under the 10 minute hard ceiling of the scheduler
            time_budget: Duration::from_secs(570),
            request_timeout: Duration::from_secs(30),
            pacing_delay: Duration::from_millis(500),
        }
    }
}

impl Settings {
    /// Production defaults with `NAVSCRAPER_OUT_DIR` applied if set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(dir) = env::var("NAVSCRAPER_OUT_DIR") {
            if !dir.trim().is_empty() {
                settings.out_dir = PathBuf::from(dir);
            }
        }
        settings
    }
}

/// The `dd-mm-yyyy` stamp shared by every artifact of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunDate(NaiveDate);

impl RunDate {
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Parse a `dd-mm-yyyy` stamp back out of an artifact name.
    pub fn parse(stamp: &str) -> Option<Self> {
        NaiveDate::parse_from_str(stamp, "%d-%m-%Y").ok().map(Self)
    }
}

impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%d-%m-%Y"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_date_formats_day_first() {
        let date = RunDate::new(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());
        assert_eq!(date.to_string(), "09-01-2026");
        assert_eq!(RunDate::parse("09-01-2026"), Some(date));
        assert_eq!(RunDate::parse("2026-01-09"), None);
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let s = Settings::default();
        assert_eq!(s.page_load_timeout, Duration::from_secs(60));
        assert_eq!(s.time_budget, Duration::from_secs(570));
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert_eq!(s.page_size, 100);
    }
}
