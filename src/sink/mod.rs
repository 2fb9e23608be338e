// src/sink/mod.rs

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{config::RunDate, extract::Table};

static RESERVED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("regex"));

/// Strip characters that are not allowed in file names on common platforms.
pub fn sanitize_filename(name: &str) -> String {
    RESERVED.replace_all(name, "").trim().to_string()
}

/// `<artifact>-<dd-mm-yyyy>.csv`
pub fn artifact_file_name(artifact: &str, date: RunDate) -> String {
    format!("{}-{}.csv", artifact, date)
}

/// Artifact name for one fund's detail table.
pub fn detail_artifact(symbol: &str, name: &str) -> String {
    format!("assets-{}-{}", symbol, sanitize_filename(name))
}

/// Writes tables as dated CSV files under one directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    out_dir: PathBuf,
}

impl CsvSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;
        Ok(Self { out_dir })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write `table` as a header row followed by data rows. Returns the path
    /// written.
    pub fn write_table(&self, artifact: &str, date: RunDate, table: &Table) -> Result<PathBuf> {
        let path = self.out_dir.join(artifact_file_name(artifact, date));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer
            .write_record(&table.headers)
            .with_context(|| format!("writing header to {}", path.display()))?;
        for row in &table.rows {
            writer
                .write_record(row)
                .with_context(|| format!("writing row to {}", path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("flushing {}", path.display()))?;

        info!(file = %path.display(), rows = table.len(), "saved");
        Ok(path)
    }
}
