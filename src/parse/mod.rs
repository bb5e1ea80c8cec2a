//! Source file readers.
//!
//! Both formats are read file-by-file from a list of paths. Paths are sorted
//! before reading so a batch always ingests in the same order for the same
//! directory contents.

pub mod esl;
pub mod sdat;

use crate::config::{BatchMode, ObisTable};
use crate::error::{AppError, Result};
use crate::models::{ConsumptionDocument, MeterSnapshot};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use esl::parse_meter_snapshot;
pub use sdat::parse_consumption_document;

/// Outcome of reading many files. `failures` is only populated in [`BatchMode::Skip`].
#[derive(Debug)]
pub struct Batch<T> {
    pub records: Vec<T>,
    pub failures: Vec<(PathBuf, AppError)>,
}

impl<T> Batch<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// List files in `dir` whose extension matches `extension` (case-insensitive), sorted by path.
///
/// A directory without matching files yields an empty list.
pub fn scan_dir(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.');
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
        if matches {
            paths.push(path);
        }
    }
    paths.sort();
    debug!(dir = %dir.as_ref().display(), count = paths.len(), "scanned directory");
    Ok(paths)
}

/// Read every path with `read`, in lexicographic path order.
pub fn read_batch<T, F>(paths: &[PathBuf], mode: BatchMode, mut read: F) -> Result<Batch<T>>
where
    F: FnMut(&Path) -> Result<T>,
{
    let mut sorted = paths.to_vec();
    sorted.sort();

    let mut batch = Batch {
        records: Vec::with_capacity(sorted.len()),
        failures: Vec::new(),
    };

    for path in sorted {
        match read(&path) {
            Ok(record) => batch.records.push(record),
            Err(e) if mode == BatchMode::Skip && e.is_per_file() => {
                warn!(path = %path.display(), "skipping file: {e}");
                batch.failures.push((path, e));
            }
            Err(e) => {
                return Err(AppError::BatchRead {
                    path,
                    source: Box::new(e),
                })
            }
        }
    }

    Ok(batch)
}

pub fn read_consumption_file(path: &Path) -> Result<ConsumptionDocument> {
    let xml = std::fs::read_to_string(path)?;
    let doc = parse_consumption_document(&xml)?;
    debug!(
        path = %path.display(),
        document_id = %doc.document_id,
        entries = doc.entries.len(),
        "read consumption document"
    );
    Ok(doc)
}

pub fn read_meter_file(path: &Path, table: &ObisTable) -> Result<MeterSnapshot> {
    let xml = std::fs::read_to_string(path)?;
    let snapshot = parse_meter_snapshot(&xml, table)?;
    debug!(
        path = %path.display(),
        ts = %snapshot.timestamp,
        sensors = snapshot.readings.len(),
        "read meter snapshot"
    );
    Ok(snapshot)
}

pub fn read_consumption_files(
    paths: &[PathBuf],
    mode: BatchMode,
) -> Result<Batch<ConsumptionDocument>> {
    read_batch(paths, mode, read_consumption_file)
}

pub fn read_meter_files(
    paths: &[PathBuf],
    mode: BatchMode,
    table: &ObisTable,
) -> Result<Batch<MeterSnapshot>> {
    read_batch(paths, mode, |p| read_meter_file(p, table))
}

/// Parse a wire timestamp. RFC 3339 first, then naive ISO 8601 read as UTC.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| AppError::Time(format!("'{}': {}", s, e)))
}
