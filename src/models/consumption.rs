use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One interval observation. The timestamp marks the start of the interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    pub timestamp: DateTime<Utc>,
    pub volume: f64,
}

impl ConsumptionEntry {
    pub fn new(timestamp: DateTime<Utc>, volume: f64) -> Self {
        Self { timestamp, volume }
    }
}

/// Identity of a consumption document for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub document_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionDocument {
    pub document_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub entries: Vec<ConsumptionEntry>,
}

impl ConsumptionDocument {
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            document_id: self.document_id.clone(),
            start: self.start,
            end: self.end,
        }
    }

    /// Sensor this document reports for: the part of the id after the last `_`.
    ///
    /// `eslevu121963_BR2294_ID742` belongs to `ID742`; an id without an
    /// underscore is its own sensor.
    pub fn sensor_id(&self) -> &str {
        match self.document_id.rsplit_once('_') {
            Some((_, tail)) if !tail.is_empty() => tail,
            _ => &self.document_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionUnit {
    Minutes,
    Hours,
}

impl ResolutionUnit {
    /// `MIN` and `H` are the wire codes; anything else is read as minutes.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "H" => ResolutionUnit::Hours,
            _ => ResolutionUnit::Minutes,
        }
    }
}

/// Fixed spacing between consecutive observations of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalResolution {
    pub value: u32,
    pub unit: ResolutionUnit,
}

impl IntervalResolution {
    pub fn step(&self) -> Duration {
        match self.unit {
            ResolutionUnit::Minutes => Duration::minutes(i64::from(self.value)),
            ResolutionUnit::Hours => Duration::hours(i64::from(self.value)),
        }
    }

    /// Start of the `index`-th observation when walking forward from `start`,
    /// or `None` when it falls outside the representable calendar.
    pub fn nth_step(&self, start: DateTime<Utc>, index: usize) -> Option<DateTime<Utc>> {
        let index = i32::try_from(index).ok()?;
        let offset = self.step().checked_mul(index)?;
        start.checked_add_signed(offset)
    }
}
