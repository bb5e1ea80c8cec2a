//! Billing snapshots (ESL meter register files).

use super::parse_instant;
use crate::config::ObisTable;
use crate::error::{AppError, Result};
use crate::models::{MeterSnapshot, TariffClass, TariffReading};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;
use tracing::debug;

struct Row {
    obis: String,
    status: Option<String>,
    value: Option<String>,
}

/// Parse one snapshot. Rows whose code is absent from `table` are ignored;
/// a mapped row with a status other than `V` fails the whole file.
pub fn parse_meter_snapshot(xml: &str, table: &ObisTable) -> Result<MeterSnapshot> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut meter_depth = 0usize;
    let mut in_period = false;
    let mut timestamp = None;
    let mut extra_periods = 0usize;
    let mut rows: Vec<Row> = Vec::new();

    loop {
        let (e, is_empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"TimePeriod" => in_period = false,
                    b"Meter" => meter_depth = meter_depth.saturating_sub(1),
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match e.local_name().as_ref() {
            b"Meter" => {
                if !is_empty {
                    meter_depth += 1;
                }
            }
            b"TimePeriod" if meter_depth > 0 => {
                if timestamp.is_some() {
                    extra_periods += 1;
                    continue;
                }
                let end = attr(&e, b"end")?
                    .ok_or_else(|| AppError::Parse("TimePeriod without end attribute".into()))?;
                let ts = parse_instant(&end)
                    .map_err(|err| AppError::Parse(format!("TimePeriod end: {err}")))?;
                timestamp = Some(ts);
                in_period = !is_empty;
            }
            _ if in_period => {
                if let Some(obis) = attr(&e, b"obis")? {
                    rows.push(Row {
                        obis,
                        status: attr(&e, b"status")?,
                        value: attr(&e, b"value")?,
                    });
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Parse("no TimePeriod with an end attribute inside Meter".into()))?;
    if extra_periods > 0 {
        debug!(%timestamp, extra_periods, "ignoring additional TimePeriod elements");
    }

    let readings = merge_rows(rows, table)?;
    Ok(MeterSnapshot {
        timestamp,
        readings,
    })
}

/// Fold rows into one reading per sensor. Total accumulates every mapped row;
/// a repeated high or low row replaces the earlier one.
fn merge_rows(rows: Vec<Row>, table: &ObisTable) -> Result<BTreeMap<String, TariffReading>> {
    let mut readings: BTreeMap<String, TariffReading> = BTreeMap::new();

    for row in rows {
        let Some(sensor_id) = table.get(row.obis.trim()) else {
            continue;
        };
        match row.status.as_deref().map(str::trim) {
            Some("V") => {}
            other => {
                return Err(AppError::Validation(format!(
                    "row {} has status {:?}, expected \"V\"",
                    row.obis,
                    other.unwrap_or("<missing>")
                )))
            }
        }
        let raw = row
            .value
            .ok_or_else(|| AppError::Parse(format!("row {} has no value", row.obis)))?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|e| AppError::Parse(format!("row {} value '{}': {}", row.obis, raw, e)))?;
        if !value.is_finite() {
            return Err(AppError::Parse(format!(
                "row {} value '{}' is not finite",
                row.obis, raw
            )));
        }

        let reading = readings.entry(sensor_id.clone()).or_default();
        reading.total += value;
        match TariffClass::of_code(&row.obis) {
            TariffClass::High => reading.high = value,
            TariffClass::Low => reading.low = value,
            TariffClass::TotalOnly => {}
        }
    }

    Ok(readings)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.local_name().as_ref() == name {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
