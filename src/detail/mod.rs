// src/detail/mod.rs
//
// Stage two: one direct fetch per fund in the holdings roster, under a soft
// time budget.

pub mod challenge;
pub mod client;
pub mod ledger;

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use serde::Deserialize;
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::{sleep, Instant};
use tracing::{info, instrument, warn};
use url::Url;

pub use challenge::{is_challenge, BrowserSolver, ChallengeSolver, NegotiatingClient};
pub use client::{DetailClient, DetailResponse, HttpDetailClient};
pub use ledger::{FailureLedger, TIME_LIMIT_SENTINEL};

use crate::{
    config::{RunDate, Settings},
    extract::{first_table, Table},
    render::chromium::ChromiumLauncher,
    sections::ROSTER_SECTION,
    sink::{detail_artifact, CsvSink},
    upload::{upload_best_effort, Uploader},
};

/// Direct HTTP detail client whose bot challenges are cleared in headless
/// Chromium.
pub fn browser_backed_client(settings: &Settings) -> Result<NegotiatingClient<HttpDetailClient>> {
    let http = HttpDetailClient::new(settings)?;
    let solver = BrowserSolver::new(Box::new(ChromiumLauncher::new(settings)), settings);
    Ok(NegotiatingClient::new(http, Box::new(solver)))
}

/// A fund to fetch details for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntity {
    pub symbol: String,
    pub name: String,
}

impl SeedEntity {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeedRow {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
}

/// Read seeds from a roster CSV with a header row. Rows without a `Symbol`
/// and `Name`, or with a blank symbol, are left out.
pub fn load_seeds<R: Read>(reader: R) -> Result<Vec<SeedEntity>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut seeds = Vec::new();
    for (line, record) in rdr.deserialize::<SeedRow>().enumerate() {
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                warn!(row = line + 1, error = %e, "skipping unreadable roster row");
                continue;
            }
        };
        match (row.symbol, row.name) {
            (Some(symbol), Some(name)) if !symbol.trim().is_empty() => {
                seeds.push(SeedEntity::new(symbol.trim(), name.trim()));
            }
            _ => {}
        }
    }
    Ok(seeds)
}

pub fn load_seeds_from_path(path: &Path) -> Result<Vec<SeedEntity>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    load_seeds(file).with_context(|| format!("reading seeds from {}", path.display()))
}

/// Newest roster CSV in `dir`, by the date stamp in its name.
pub fn find_latest_roster(dir: &Path) -> Result<Option<PathBuf>> {
    let prefix = format!("{}-", ROSTER_SECTION);
    let pattern = format!(
        "{}/{}*.csv",
        Pattern::escape(&dir.display().to_string()),
        prefix
    );
    let mut best: Option<(RunDate, PathBuf)> = None;
    for entry in glob(&pattern)?.flatten() {
        let Some(stamp) = entry
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(&prefix))
        else {
            continue;
        };
        let Some(date) = RunDate::parse(stamp) else {
            continue;
        };
        if best.as_ref().map_or(true, |(d, _)| date.date() > d.date()) {
            best = Some((date, entry));
        }
    }
    Ok(best.map(|(_, path)| path))
}

/// `<base><symbol>?fsk=fs`, with the symbol escaped as one path segment.
pub fn detail_url(base: &str, symbol: &str) -> Result<Url> {
    if matches!(symbol, "" | "." | "..") {
        anyhow::bail!("invalid fund symbol {:?}", symbol);
    }
    let mut url = Url::parse(base).with_context(|| format!("parsing detail base {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("detail base {} cannot take a path", base))?
        .pop_if_empty()
        .push(symbol);
    url.set_query(Some("fsk=fs"));
    Ok(url)
}

/// What happened to one fund. Terminal; nothing is retried.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Table),
    HttpFailure(u16),
    /// Request, body, or table parse failure.
    TransportFailure(String),
    TimeBudgetExceeded,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Seeds handed to the batch.
    pub attempted: usize,
    /// Seeds actually fetched before the batch ended.
    pub processed: usize,
    pub succeeded: usize,
    pub ledger: FailureLedger,
    pub log_path: Option<PathBuf>,
}

impl BatchReport {
    pub fn stopped_early(&self) -> bool {
        self.ledger.stopped()
    }
}

async fn fetch_detail(client: &dyn DetailClient, url: &Url, pacing: Duration) -> FetchOutcome {
    let resp = match client.get(url).await {
        Ok(resp) => resp,
        Err(e) => return FetchOutcome::TransportFailure(format!("{:#}", e)),
    };

    let outcome = if resp.status == 200 {
        match first_table(&resp.body) {
            Some(table) => FetchOutcome::Success(table),
            None => FetchOutcome::TransportFailure("no tables found".to_string()),
        }
    } else {
        FetchOutcome::HttpFailure(resp.status)
    };

    // politeness pause after every answered request
    sleep(pacing).await;
    outcome
}

/// Fetch, parse and persist the detail table of every seed, in order.
///
/// The budget is checked before each fund, never mid-request, so one slow
/// request can overrun it by up to the request timeout. Funds after the
/// cutoff are not fetched. The failure log is written only when something
/// failed.
#[instrument(level = "info", skip_all, fields(funds = seeds.len()))]
pub async fn run_batch(
    client: &dyn DetailClient,
    seeds: &[SeedEntity],
    settings: &Settings,
    sink: &CsvSink,
    uploader: &dyn Uploader,
    date: RunDate,
) -> BatchReport {
    let start = Instant::now();
    let total = seeds.len();
    let mut report = BatchReport {
        attempted: total,
        ..Default::default()
    };

    for (idx, seed) in seeds.iter().enumerate() {
        let symbol = seed.symbol.as_str();
        let outcome = if start.elapsed() > settings.time_budget {
            FetchOutcome::TimeBudgetExceeded
        } else {
            info!("[{}/{}] Process {}...", idx + 1, total, symbol);
            report.processed += 1;
            match detail_url(&settings.detail_base_url, symbol) {
                Ok(url) => fetch_detail(client, &url, settings.pacing_delay).await,
                Err(e) => FetchOutcome::TransportFailure(format!("{:#}", e)),
            }
        };

        match outcome {
            FetchOutcome::Success(table) => {
                match sink.write_table(&detail_artifact(symbol, &seed.name), date, &table) {
                    Ok(path) => {
                        report.succeeded += 1;
                        upload_best_effort(uploader, &path).await;
                    }
                    Err(e) => {
                        warn!(symbol, error = %format!("{:#}", e), "error");
                        report.ledger.error(symbol, &format!("{:#}", e));
                    }
                }
            }
            FetchOutcome::HttpFailure(status) => {
                warn!(symbol, status, "failed");
                report.ledger.http_failure(symbol, status);
            }
            FetchOutcome::TransportFailure(cause) => {
                warn!(symbol, error = %cause, "error");
                report.ledger.error(symbol, &cause);
            }
            FetchOutcome::TimeBudgetExceeded => {
                warn!(
                    elapsed = ?start.elapsed(),
                    budget = ?settings.time_budget,
                    remaining = total - idx,
                    "time limit approaching, stopping detailed scraping"
                );
                report.ledger.stop_for_time_limit();
                break;
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.ledger.item_failures(),
        skipped = total - report.processed,
        "scraping summary"
    );

    match report.ledger.flush(sink.out_dir(), total) {
        Ok(Some(path)) => {
            info!(file = %path.display(), "wrote failures");
            report.log_path = Some(path);
        }
        Ok(None) => {}
        Err(e) => warn!(error = %format!("{:#}", e), "could not write failure log"),
    }
    report
}
