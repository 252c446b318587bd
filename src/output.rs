//! Output formatting and persistence for sweep-cycle statistics.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use tracing::{debug, info};

use crate::stats::CycleStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs cycle statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &CycleStats) {
    debug!("{:#?}", stats);
}

/// Logs cycle statistics as pretty-printed JSON.
pub fn print_json(stats: &CycleStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Appends a [`CycleStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, stats: &CycleStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}
