//! Flat CSV and JSON dumps of the deduplicated input.

use crate::config::ExportFormat;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::models::{ConsumptionDocument, MeterSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONSUMPTION_CSV: &str = "consumption_data.csv";
pub const METER_CSV: &str = "meter_data.csv";
pub const CONSUMPTION_JSON: &str = "consumption_data.json";
pub const METER_JSON: &str = "meter_data.json";

#[derive(Debug, Serialize)]
struct ConsumptionRow<'a> {
    document_id: &'a str,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    timestamp: DateTime<Utc>,
    volume: f64,
}

#[derive(Debug, Serialize)]
struct MeterRow<'a> {
    timestamp: DateTime<Utc>,
    sensor_id: &'a str,
    total: f64,
    high: f64,
    low: f64,
}

/// Write both collections in `format` into `dir`.
pub fn export(dataset: &Dataset, dir: impl AsRef<Path>, format: ExportFormat) -> Result<Vec<PathBuf>> {
    match format {
        ExportFormat::Csv => export_csv(dir, dataset.documents(), dataset.snapshots()),
        ExportFormat::Json => export_json(dir, dataset.documents(), dataset.snapshots()),
    }
}

/// One `;`-separated row per consumption entry and per (snapshot, sensor) reading.
pub fn export_csv(
    dir: impl AsRef<Path>,
    documents: &[ConsumptionDocument],
    snapshots: &[MeterSnapshot],
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let consumption_path = dir.join(CONSUMPTION_CSV);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&consumption_path)?;
    let mut rows = 0usize;
    for doc in documents {
        for entry in &doc.entries {
            writer.serialize(ConsumptionRow {
                document_id: &doc.document_id,
                start_date: doc.start,
                end_date: doc.end,
                timestamp: entry.timestamp,
                volume: entry.volume,
            })?;
            rows += 1;
        }
    }
    writer.flush()?;

    let meter_path = dir.join(METER_CSV);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&meter_path)?;
    let mut readings = 0usize;
    for snapshot in snapshots {
        for (sensor_id, reading) in &snapshot.readings {
            writer.serialize(MeterRow {
                timestamp: snapshot.timestamp,
                sensor_id,
                total: reading.total,
                high: reading.high,
                low: reading.low,
            })?;
            readings += 1;
        }
    }
    writer.flush()?;

    info!(dir = %dir.display(), rows, readings, "exported csv");
    Ok(vec![consumption_path, meter_path])
}

pub fn export_json(
    dir: impl AsRef<Path>,
    documents: &[ConsumptionDocument],
    snapshots: &[MeterSnapshot],
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let consumption_path = dir.join(CONSUMPTION_JSON);
    serde_json::to_writer_pretty(BufWriter::new(File::create(&consumption_path)?), documents)?;

    let meter_path = dir.join(METER_JSON);
    serde_json::to_writer_pretty(BufWriter::new(File::create(&meter_path)?), snapshots)?;

    info!(
        dir = %dir.display(),
        documents = documents.len(),
        snapshots = snapshots.len(),
        "exported json"
    );
    Ok(vec![consumption_path, meter_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConsumptionEntry, TariffReading};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn fixtures() -> (Vec<ConsumptionDocument>, Vec<MeterSnapshot>) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let doc = ConsumptionDocument {
            document_id: "doc_ID742".into(),
            start,
            end: start + Duration::days(1),
            entries: vec![
                ConsumptionEntry::new(start, 1.5),
                ConsumptionEntry::new(start + Duration::minutes(15), 2.0),
            ],
        };
        let mut readings = BTreeMap::new();
        readings.insert(
            "ID742".to_string(),
            TariffReading {
                total: 3.0,
                high: 1.0,
                low: 2.0,
            },
        );
        let snapshot = MeterSnapshot {
            timestamp: start,
            readings,
        };
        (vec![doc], vec![snapshot])
    }

    #[test]
    fn test_export_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested/out");
        let (docs, snaps) = fixtures();

        let paths = export_csv(&out, &docs, &snaps).unwrap();
        assert_eq!(paths, vec![out.join(CONSUMPTION_CSV), out.join(METER_CSV)]);

        let consumption = std::fs::read_to_string(&paths[0]).unwrap();
        let lines: Vec<&str> = consumption.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "document_id;start_date;end_date;timestamp;volume");
        assert!(lines[1].starts_with("doc_ID742;2024-01-01T00:00:00Z;2024-01-02T00:00:00Z;"));
        assert!(lines[2].ends_with(";2.0"));

        let meter = std::fs::read_to_string(&paths[1]).unwrap();
        let lines: Vec<&str> = meter.lines().collect();
        assert_eq!(lines[0], "timestamp;sensor_id;total;high;low");
        assert_eq!(lines[1], "2024-01-01T00:00:00Z;ID742;3.0;1.0;2.0");
    }

    #[test]
    fn test_export_json() {
        let tmp = tempfile::tempdir().unwrap();
        let (docs, snaps) = fixtures();

        let paths = export_json(tmp.path(), &docs, &snaps).unwrap();
        let raw = std::fs::read_to_string(&paths[0]).unwrap();
        let back: Vec<ConsumptionDocument> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, docs);

        let raw = std::fs::read_to_string(&paths[1]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["readings"]["ID742"]["low"], 2.0);
    }
}
