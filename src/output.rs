//! Output formatting and persistence hand-off for extracted records.
//!
//! Supports pretty-printing, JSON lines, and CSV append. Column and key names
//! equal the record field names, which match the storage tables.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::stats::FeedStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TRIP_UPDATE_EVENTS_TABLE: &str = "trip_update_events";
pub const VEHICLE_POSITIONS_TABLE: &str = "vehicle_positions";

/// On-disk format for extracted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "jsonl",
        }
    }

    /// File for `table` under `dir`, e.g. `records/vehicle_positions.jsonl`.
    pub fn table_path(&self, dir: &Path, table: &str) -> PathBuf {
        dir.join(format!("{table}.{}", self.extension()))
    }

    /// Appends records to `path` in this format.
    pub fn append<T: Serialize>(&self, path: impl AsRef<Path>, records: &[T]) -> Result<usize> {
        match self {
            OutputFormat::Csv => append_records(path, records),
            OutputFormat::Json => append_json_lines(path, records),
        }
    }
}

/// Logs feed statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &FeedStats) {
    debug!("{:#?}", stats);
}

/// Logs feed statistics as pretty-printed JSON.
pub fn print_json(stats: &FeedStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Renders records as JSON lines, one object per record.
pub fn to_json_lines<T: Serialize>(records: &[T]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Appends records to a JSON lines file, creating it if needed.
pub fn append_json_lines<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<usize> {
    let path = path.as_ref();
    if records.is_empty() {
        return Ok(0);
    }
    debug!(path = %path.display(), rows = records.len(), "Appending JSON lines");

    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    file.write_all(to_json_lines(records)?.as_bytes())?;
    file.flush()?;

    Ok(records.len())
}

/// Appends records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist. Returns the
/// number of rows written; an empty slice leaves the file untouched.
pub fn append_records<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<usize> {
    let path = path.as_ref();
    if records.is_empty() {
        return Ok(0);
    }

    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(records.len())
}
