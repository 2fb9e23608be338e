use anyhow::Result;
use navscraper::{
    config::{RunDate, Settings},
    detail::{browser_backed_client, DetailClient},
    pipeline,
    render::chromium::ChromiumLauncher,
    sink::CsvSink,
    upload::uploader_from_env,
};
use std::env;
use tokio::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .with_target(false)
        .init();
    info!("starting main scraper");

    // ─── 2) configure ────────────────────────────────────────────────
    let settings = Settings::from_env();
    let date = RunDate::today();
    let sink = match CsvSink::new(&settings.out_dir) {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %format!("{:#}", e), "cannot prepare output directory");
            return Ok(());
        }
    };
    let uploader = uploader_from_env();
    let launcher = ChromiumLauncher::new(&settings);
    let client = match browser_backed_client(&settings) {
        Ok(c) => Some(c),
        Err(e) => {
            error!(error = %format!("{:#}", e), "detail client unavailable");
            None
        }
    };

    // ─── 3) run every phase ──────────────────────────────────────────
    let start = Instant::now();
    let summary = pipeline::run_all(
        &launcher,
        client.as_ref().map(|c| c as &dyn DetailClient),
        &settings,
        &sink,
        uploader.as_ref(),
        date,
    )
    .await;

    if let Some(batch) = &summary.batch {
        info!(
            attempted = batch.attempted,
            succeeded = batch.succeeded,
            stopped_early = batch.stopped_early(),
            "detail batch finished"
        );
    }
    info!(elapsed = ?start.elapsed(), "all done");

    // partial failures are reported, never turned into an exit code
    Ok(())
}
