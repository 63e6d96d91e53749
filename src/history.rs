//! Generation history.
//!
//! Every successful, non-cached render appends one [`GenerationRecord`].
//! Listing returns the most recent records, newest first. The default store
//! is an append-only JSON Lines file; [`MemoryHistory`] keeps records in
//! process for tests and embedding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Records listed when the caller gives no limit.
pub const DEFAULT_LISTED: usize = 50;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub category: String,
    pub content: String,
    /// The request as received, for display and replay.
    pub configuration: serde_json::Value,
    pub output_format: String,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub trait HistoryStore: Send + Sync {
    fn append(&self, record: &GenerationRecord) -> Result<(), HistoryError>;

    /// Up to `limit` records, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<GenerationRecord>, HistoryError>;
}

/// Append-only JSON Lines file.
pub struct JsonlHistory {
    path: PathBuf,
    write: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonlHistory {
    fn append(&self, record: &GenerationRecord) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<GenerationRecord>, HistoryError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GenerationRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("{}:{}: skipping bad record: {e}", self.path.display(), n + 1),
            }
        }
        Ok(newest_first(records, limit))
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<GenerationRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, record: &GenerationRecord) -> Result<(), HistoryError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<GenerationRecord>, HistoryError> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(newest_first(records, limit))
    }
}

/// Sort by `created_at` descending (stable, so later appends win ties) and
/// keep `limit`.
fn newest_first(mut records: Vec<GenerationRecord>, limit: usize) -> Vec<GenerationRecord> {
    records.reverse();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records.truncate(limit);
    records
}
