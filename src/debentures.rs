// src/debentures.rs
//
// The debenture listing: a single DataTable on its own page, no tabs.

use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

use crate::{
    config::{RunDate, Settings, DEBENTURE_ARTIFACT, DEBENTURE_LENGTH_CONTROL, DEBENTURE_TABLE_ID},
    error::ScrapeError,
    extract::{extract, Extraction},
    render::{log_diagnostics, release, RenderSession, SessionLauncher},
    sink::CsvSink,
    upload::{upload_best_effort, Uploader},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebentureOutcome {
    Persisted(PathBuf),
    TableNotFound,
    NoRows,
}

#[instrument(level = "info", skip_all)]
pub async fn scrape_debentures(
    launcher: &dyn SessionLauncher,
    settings: &Settings,
    sink: &CsvSink,
    uploader: &dyn Uploader,
    date: RunDate,
) -> Result<DebentureOutcome, ScrapeError> {
    let mut session = launcher
        .launch()
        .await
        .map_err(|e| ScrapeError::FatalSetup(e.to_string()))?;
    let result = run_debentures(session.as_mut(), settings, sink, uploader, date).await;
    release(session).await;
    result
}

async fn run_debentures(
    session: &mut dyn RenderSession,
    settings: &Settings,
    sink: &CsvSink,
    uploader: &dyn Uploader,
    date: RunDate,
) -> Result<DebentureOutcome, ScrapeError> {
    info!(url = %settings.debenture_page_url, "navigating");
    if let Err(e) = session
        .open(
            &settings.debenture_page_url,
            DEBENTURE_TABLE_ID,
            settings.page_load_timeout,
        )
        .await
    {
        error!(error = %e, "error scraping debentures");
        log_diagnostics(session).await;
        return Err(ScrapeError::FatalSetup(e.to_string()));
    }

    // Best effort: without it we still get the first page of rows.
    if let Err(e) = session
        .select_page_size(DEBENTURE_LENGTH_CONTROL, settings.page_size)
        .await
    {
        warn!(error = %e, "could not select page length");
    }

    let markup = session
        .current_markup()
        .await
        .map_err(|e| ScrapeError::FatalSetup(e.to_string()))?;

    match extract(&markup, DEBENTURE_TABLE_ID) {
        Extraction::Found(table) => {
            let path = sink
                .write_table(DEBENTURE_ARTIFACT, date, &table)
                .map_err(|e| ScrapeError::Section {
                    section: DEBENTURE_ARTIFACT,
                    reason: format!("{:#}", e),
                })?;
            upload_best_effort(uploader, &path).await;
            Ok(DebentureOutcome::Persisted(path))
        }
        Extraction::NoRows { .. } => {
            warn!("no rows found for debentures");
            Ok(DebentureOutcome::NoRows)
        }
        Extraction::NotFound => {
            warn!("debenture table not found");
            Ok(DebentureOutcome::TableNotFound)
        }
    }
}
