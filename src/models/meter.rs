use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Register reading for one sensor in a billing snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffReading {
    pub total: f64,
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    pub timestamp: DateTime<Utc>,
    pub readings: BTreeMap<String, TariffReading>,
}

impl MeterSnapshot {
    pub fn reading(&self, sensor_id: &str) -> Option<&TariffReading> {
        self.readings.get(sensor_id)
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::of(&self.timestamp)
    }
}

/// Calendar month key, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Which tariff register an OBIS code contributes to besides the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TariffClass {
    High,
    Low,
    TotalOnly,
}

impl TariffClass {
    /// Classified by the last dotted segment: `.1` is high tariff, `.2` low tariff.
    pub fn of_code(code: &str) -> Self {
        match code.rsplit('.').next().map(str::trim) {
            Some("1") => TariffClass::High,
            Some("2") => TariffClass::Low,
            _ => TariffClass::TotalOnly,
        }
    }
}
