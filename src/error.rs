// src/error.rs

use thiserror::Error;

/// Failures surfaced by a rendering session.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser error: {0}")]
    Browser(String),
}

/// Phase-level failures. None of these cross a phase boundary; the driver
/// logs them and moves on to the next phase.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Could not allocate a session or open the root page.
    #[error("fatal setup failure: {0}")]
    FatalSetup(String),

    /// One section's interaction failed; the run continues.
    #[error("section {section} failed: {reason}")]
    Section {
        section: &'static str,
        reason: String,
    },
}

impl ScrapeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::FatalSetup(_))
    }
}
