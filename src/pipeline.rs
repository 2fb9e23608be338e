// src/pipeline.rs
//
// Runs the three phases in order. A phase failing never stops the next one.

use tracing::{error, info, warn};

use crate::{
    config::{RunDate, Settings},
    debentures::{scrape_debentures, DebentureOutcome},
    detail::{load_seeds_from_path, run_batch, BatchReport, DetailClient},
    render::SessionLauncher,
    sections::{scrape_sections, SectionReport},
    sink::CsvSink,
    upload::Uploader,
};

#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub sections: Option<SectionReport>,
    pub debentures: Option<DebentureOutcome>,
    pub batch: Option<BatchReport>,
}

/// sections → debentures → detail batch.
///
/// The detail batch runs only when the sections phase handed off a roster
/// and a detail client is available.
pub async fn run_all(
    launcher: &dyn SessionLauncher,
    client: Option<&dyn DetailClient>,
    settings: &Settings,
    sink: &CsvSink,
    uploader: &dyn Uploader,
    date: RunDate,
) -> PipelineSummary {
    let mut summary = PipelineSummary::default();

    match scrape_sections(launcher, settings, sink, uploader, date).await {
        Ok(report) => summary.sections = Some(report),
        Err(e) => error!(error = %e, "sections phase aborted"),
    }

    match scrape_debentures(launcher, settings, sink, uploader, date).await {
        Ok(outcome) => summary.debentures = Some(outcome),
        Err(e) => error!(error = %e, "debenture phase aborted"),
    }

    let roster = summary.sections.as_ref().and_then(|r| r.roster.clone());
    match (roster, client) {
        (Some(roster), Some(client)) => {
            info!(roster = %roster.display(), "reading symbols for detailed scraping");
            match load_seeds_from_path(&roster) {
                Ok(seeds) => {
                    info!(funds = seeds.len(), "found funds");
                    summary.batch =
                        Some(run_batch(client, &seeds, settings, sink, uploader, date).await);
                }
                Err(e) => error!(error = %format!("{:#}", e), "could not read roster"),
            }
        }
        (None, _) => warn!("stock holdings file not found, skipping detailed scraping"),
        (Some(_), None) => warn!("no detail client, skipping detailed scraping"),
    }

    info!("all tasks completed");
    summary
}
