// src/sections.rs
//
// Stage one: walk the tabbed tables on the fund page.

use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::{RunDate, Settings, FUND_PAGE_ANCHOR},
    error::ScrapeError,
    extract::{extract, Extraction},
    render::{log_diagnostics, release, RenderSession, SessionLauncher},
    sink::CsvSink,
    upload::{upload_best_effort, Uploader},
};

/// One tab on the fund page and the DataTable behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionDescriptor {
    pub name: &'static str,
    pub tab_href: &'static str,
    pub table_id: &'static str,
    /// `name` attribute of the DataTables "show N entries" select.
    pub length_control: &'static str,
}

/// The section whose output seeds the detail batch.
pub const ROSTER_SECTION: &str = "Stock_Holdings_Fund_PE_Ratio";

pub const SECTIONS: &[SectionDescriptor] = &[
    SectionDescriptor {
        name: "NAV",
        tab_href: "#home",
        table_id: "DataTables_Table_0",
        length_control: "DataTables_Table_0_length",
    },
    SectionDescriptor {
        name: ROSTER_SECTION,
        tab_href: "#stkHolding",
        table_id: "DataTables_Table_1",
        length_control: "DataTables_Table_1_length",
    },
    SectionDescriptor {
        name: "Assets_Allocation",
        tab_href: "#assetsAllocation",
        table_id: "DataTables_Table_2",
        length_control: "DataTables_Table_2_length",
    },
    SectionDescriptor {
        name: "Distributable_Dividend",
        tab_href: "#distributableDividend",
        table_id: "DataTables_Table_3",
        length_control: "DataTables_Table_3_length",
    },
];

/// Where a section got to before it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionState {
    Pending,
    Activated,
    Extracted,
    Persisted,
    Failed,
}

impl SectionState {
    pub fn as_str(&self) -> &str {
        match self {
            SectionState::Pending => "pending",
            SectionState::Activated => "activated",
            SectionState::Extracted => "extracted",
            SectionState::Persisted => "persisted",
            SectionState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    Persisted(PathBuf),
    TableNotFound,
    NoRows,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct SectionReport {
    pub outcomes: Vec<(&'static str, SectionOutcome)>,
    /// Roster CSV handed to the detail batch, if that section was persisted.
    pub roster: Option<PathBuf>,
}

impl SectionReport {
    pub fn persisted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SectionOutcome::Persisted(_)))
            .count()
    }
}

/// Scrape every section in `SECTIONS` with one browser session.
///
/// Failing to launch the browser or open the fund page is fatal for this
/// phase; anything after that only costs the section it happened in.
#[instrument(level = "info", skip_all)]
pub async fn scrape_sections(
    launcher: &dyn SessionLauncher,
    settings: &Settings,
    sink: &CsvSink,
    uploader: &dyn Uploader,
    date: RunDate,
) -> Result<SectionReport, ScrapeError> {
    let mut session = launcher
        .launch()
        .await
        .map_err(|e| ScrapeError::FatalSetup(e.to_string()))?;

    let result = run_sections(
        session.as_mut(),
        SECTIONS,
        ROSTER_SECTION,
        settings,
        sink,
        uploader,
        date,
    )
    .await;

    release(session).await;
    result
}

/// Open the fund page and run the generic per-section procedure over
/// `sections`.
pub async fn run_sections(
    session: &mut dyn RenderSession,
    sections: &[SectionDescriptor],
    roster_section: &str,
    settings: &Settings,
    sink: &CsvSink,
    uploader: &dyn Uploader,
    date: RunDate,
) -> Result<SectionReport, ScrapeError> {
    info!(url = %settings.fund_page_url, "navigating");
    if let Err(e) = session
        .open(&settings.fund_page_url, FUND_PAGE_ANCHOR, settings.page_load_timeout)
        .await
    {
        error!(error = %e, "critical error opening fund page");
        log_diagnostics(session).await;
        return Err(ScrapeError::FatalSetup(e.to_string()));
    }

    let mut report = SectionReport::default();
    for section in sections {
        info!(section = section.name, "scraping");
        let outcome = match scrape_section(session, section, settings, sink, uploader, date).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "error scraping section");
                SectionOutcome::Failed(e.to_string())
            }
        };
        if section.name == roster_section {
            if let SectionOutcome::Persisted(path) = &outcome {
                report.roster = Some(path.clone());
            }
        }
        report.outcomes.push((section.name, outcome));
    }

    info!(
        persisted = report.persisted(),
        total = sections.len(),
        roster = report.roster.is_some(),
        "sections done"
    );
    Ok(report)
}

async fn scrape_section(
    session: &mut dyn RenderSession,
    section: &SectionDescriptor,
    settings: &Settings,
    sink: &CsvSink,
    uploader: &dyn Uploader,
    date: RunDate,
) -> Result<SectionOutcome, ScrapeError> {
    let fail = |source: anyhow::Error| {
        debug!(section = section.name, state = SectionState::Failed.as_str());
        ScrapeError::Section {
            section: section.name,
            reason: format!("{:#}", source),
        }
    };
    debug!(section = section.name, state = SectionState::Pending.as_str());

    session
        .activate_section(section.tab_href)
        .await
        .map_err(|e| fail(e.into()))?;
    session
        .select_page_size(section.length_control, settings.page_size)
        .await
        .map_err(|e| fail(e.into()))?;
    debug!(section = section.name, state = SectionState::Activated.as_str());

    let markup = session.current_markup().await.map_err(|e| fail(e.into()))?;
    let table = match extract(&markup, section.table_id) {
        Extraction::Found(table) => table,
        Extraction::NoRows { .. } => {
            warn!(section = section.name, "no rows found");
            return Ok(SectionOutcome::NoRows);
        }
        Extraction::NotFound => {
            warn!(section = section.name, table = section.table_id, "table not found");
            return Ok(SectionOutcome::TableNotFound);
        }
    };
    debug!(section = section.name, state = SectionState::Extracted.as_str(), rows = table.len());

    let path = sink
        .write_table(section.name, date, &table)
        .map_err(fail)?;
    debug!(section = section.name, state = SectionState::Persisted.as_str());

    upload_best_effort(uploader, &path).await;
    Ok(SectionOutcome::Persisted(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{FakeLauncher, FakeState};
    use crate::upload::testing::RecordingUploader;
    use anyhow::Result;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn date() -> RunDate {
        RunDate::new(NaiveDate::from_ymd_opt(2026, 1, 12).unwrap())
    }

    fn table_markup(id: &str, headers: &[&str], rows: &[&[&str]]) -> String {
        let head: String = headers.iter().map(|h| format!("<th>{h}</th>")).collect();
        let body: String = rows
            .iter()
            .map(|r| {
                let cells: String = r.iter().map(|c| format!("<td>{c}</td>")).collect();
                format!("<tr>{cells}</tr>")
            })
            .collect();
        format!(
            "<html><body><div id=\"home\"></div><table id=\"{id}\"><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table></body></html>"
        )
    }

    fn full_site() -> FakeState {
        let mut tabs = HashMap::new();
        tabs.insert(
            "#home".to_string(),
            table_markup("DataTables_Table_0", &["Symbol", "NAV"], &[&["NMB50", "10.2"]]),
        );
        tabs.insert(
            "#stkHolding".to_string(),
            table_markup(
                "DataTables_Table_1",
                &["Symbol", "Name", "PE"],
                &[&["NMB50", "NMB 50", "11"], &["C30MF", "Citizens 30", "9"]],
            ),
        );
        tabs.insert(
            "#assetsAllocation".to_string(),
            table_markup("DataTables_Table_2", &["Symbol", "Equity"], &[&["NMB50", "80%"]]),
        );
        tabs.insert(
            "#distributableDividend".to_string(),
            table_markup("DataTables_Table_3", &["Symbol", "Dividend"], &[&["NMB50", "5%"]]),
        );
        FakeState {
            landing_markup: "<div id=\"home\"></div>".into(),
            tabs,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn persists_every_section_and_hands_off_roster() -> Result<()> {
        let dir = tempdir()?;
        let sink = CsvSink::new(dir.path())?;
        let uploader = RecordingUploader::default();
        let launcher = FakeLauncher::with(full_site());

        let report =
            scrape_sections(&launcher, &Settings::default(), &sink, &uploader, date()).await?;

        assert_eq!(report.persisted(), 4);
        let roster = report.roster.expect("roster");
        assert_eq!(
            roster.file_name().unwrap().to_string_lossy(),
            "Stock_Holdings_Fund_PE_Ratio-12-01-2026.csv"
        );
        assert!(roster.exists());
        assert_eq!(uploader.paths().len(), 4);
        assert_eq!(launcher.closed(), 1);

        let state = launcher.state.lock().unwrap();
        assert!(state.page_sizes.iter().all(|(_, size)| *size == 100));
        Ok(())
    }

    #[tokio::test]
    async fn failed_section_does_not_stop_later_ones() -> Result<()> {
        let dir = tempdir()?;
        let sink = CsvSink::new(dir.path())?;
        let uploader = RecordingUploader::default();
        let mut site = full_site();
        site.tabs.remove("#home");
        site.missing_controls
            .insert("DataTables_Table_2_length".to_string());
        let launcher = FakeLauncher::with(site);

        let report =
            scrape_sections(&launcher, &Settings::default(), &sink, &uploader, date()).await?;

        assert!(matches!(report.outcomes[0].1, SectionOutcome::Failed(_)));
        assert!(matches!(report.outcomes[1].1, SectionOutcome::Persisted(_)));
        assert!(matches!(report.outcomes[2].1, SectionOutcome::Failed(_)));
        assert!(matches!(report.outcomes[3].1, SectionOutcome::Persisted(_)));
        assert!(report.roster.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_empty_tables_produce_no_artifact() -> Result<()> {
        let dir = tempdir()?;
        let sink = CsvSink::new(dir.path())?;
        let uploader = RecordingUploader::default();
        let mut site = full_site();
        // roster tab renders a different table id
        site.tabs.insert(
            "#stkHolding".to_string(),
            table_markup("DataTables_Table_9", &["Symbol"], &[&["X"]]),
        );
        // dividend tab has only a malformed row
        site.tabs.insert(
            "#distributableDividend".to_string(),
            table_markup("DataTables_Table_3", &["Symbol", "Dividend"], &[&["only one"]]),
        );
        let launcher = FakeLauncher::with(site);

        let report =
            scrape_sections(&launcher, &Settings::default(), &sink, &uploader, date()).await?;

        assert_eq!(report.outcomes[1].1, SectionOutcome::TableNotFound);
        assert_eq!(report.outcomes[3].1, SectionOutcome::NoRows);
        assert!(report.roster.is_none());
        assert!(!dir
            .path()
            .join("Distributable_Dividend-12-01-2026.csv")
            .exists());
        assert_eq!(uploader.paths().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn root_page_timeout_is_fatal_and_releases_browser() -> Result<()> {
        let dir = tempdir()?;
        let sink = CsvSink::new(dir.path())?;
        let uploader = RecordingUploader::default();
        let mut site = full_site();
        site.open_fails = true;
        let launcher = FakeLauncher::with(site);

        let err = scrape_sections(&launcher, &Settings::default(), &sink, &uploader, date())
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(launcher.launched(), 1);
        assert_eq!(launcher.closed(), 1);
        assert!(uploader.paths().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn launch_failure_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        let sink = CsvSink::new(dir.path())?;
        let launcher = FakeLauncher::with(FakeState {
            launch_fails: true,
            ..Default::default()
        });
        let err = scrape_sections(
            &launcher,
            &Settings::default(),
            &sink,
            &RecordingUploader::default(),
            date(),
        )
        .await
        .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(launcher.closed(), 0);
        Ok(())
    }
}
