// src/detail/ledger.rs

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::FAILURE_LOG_NAME;

pub const TIME_LIMIT_SENTINEL: &str = "BATCH STOPPED: Time Limit Exceeded";

/// Append-only list of per-fund failures, written once when the batch ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FailureLedger {
    entries: Vec<String>,
    stopped: bool,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http_failure(&mut self, symbol: &str, status: u16) {
        self.push(format!("{}: HTTP {}", symbol, status));
    }

    pub fn error(&mut self, symbol: &str, cause: &str) {
        self.push(format!("{}: Error - {}", symbol, cause));
    }

    /// Close the ledger with the time-limit marker. Later calls are ignored.
    pub fn stop_for_time_limit(&mut self) {
        if !self.stopped {
            self.entries.push(TIME_LIMIT_SENTINEL.to_string());
            self.stopped = true;
        }
    }

    fn push(&mut self, entry: String) {
        if !self.stopped {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Per-fund failures, excluding the time-limit marker.
    pub fn item_failures(&self) -> usize {
        self.entries.len() - usize::from(self.stopped)
    }

    /// The log file's lines: entries, a blank line, then the attempted count.
    pub fn lines(&self, attempted: usize) -> Vec<String> {
        let mut lines = self.entries.clone();
        lines.push(String::new());
        lines.push(format!("Total Funds Attempted: {}", attempted));
        lines
    }

    /// Write the failure log into `dir`. An empty ledger writes nothing.
    pub fn flush(&self, dir: &Path, attempted: usize) -> Result<Option<PathBuf>> {
        if self.is_empty() {
            return Ok(None);
        }
        let path = dir.join(FAILURE_LOG_NAME);
        let mut body = self.lines(attempted).join("\n");
        body.push('\n');
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        Ok(Some(path))
    }
}
