//! Source feed reader: one CSV row per imaging study.

use std::path::Path;

use thiserror::Error;

use crate::models::StudyRecord;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Read the complete feed into memory. The engine processes discrete,
/// file-bounded batches; the feed is never streamed.
pub fn read_feed(path: &Path) -> Result<Vec<StudyRecord>, FeedError> {
    if !path.exists() {
        return Err(FeedError::NotFound(path.display().to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: StudyRecord = row?;
        records.push(record);
    }

    tracing::info!(records = records.len(), "Feed read from {}", path.display());
    Ok(records)
}
