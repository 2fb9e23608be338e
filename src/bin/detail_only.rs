// Run only the detail batch, seeded from the newest roster CSV in a directory.

use anyhow::{Context, Result};
use navscraper::{
    config::{RunDate, Settings},
    detail::{browser_backed_client, find_latest_roster, load_seeds_from_path, run_batch},
    sink::CsvSink,
    upload::uploader_from_env,
};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .init();

    let dir = env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let Some(roster) = find_latest_roster(&dir)? else {
        warn!(dir = %dir.display(), "no stock holdings CSV found, run the main scraper first");
        return Ok(());
    };
    info!(roster = %roster.display(), "reading symbols");

    let seeds = load_seeds_from_path(&roster)?;
    info!(funds = seeds.len(), "found funds to scrape");

    let settings = Settings::from_env();
    let sink = CsvSink::new(&settings.out_dir)?;
    let client = browser_backed_client(&settings).context("building HTTP client")?;
    let uploader = uploader_from_env();

    let report = run_batch(
        &client,
        &seeds,
        &settings,
        &sink,
        uploader.as_ref(),
        RunDate::today(),
    )
    .await;

    info!(
        succeeded = report.succeeded,
        failed = report.ledger.item_failures(),
        "completed"
    );
    Ok(())
}
