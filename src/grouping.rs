use crate::models::{MeterSnapshot, TariffReading, YearMonth};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshots bucketed by the calendar month of their timestamp.
pub fn group_by_month(snapshots: &[MeterSnapshot]) -> BTreeMap<YearMonth, Vec<&MeterSnapshot>> {
    let mut groups: BTreeMap<YearMonth, Vec<&MeterSnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        groups.entry(snapshot.year_month()).or_default().push(snapshot);
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TariffPoint {
    pub timestamp: DateTime<Utc>,
    pub reading: TariffReading,
}

/// Tariff register history of one sensor, ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorTariffSeries {
    points: Vec<TariffPoint>,
}

impl SensorTariffSeries {
    /// Every snapshot carrying a reading for `sensor_id`, across all groups.
    ///
    /// Points sharing a timestamp have no defined relative order.
    pub fn collect(groups: &BTreeMap<YearMonth, Vec<&MeterSnapshot>>, sensor_id: &str) -> Self {
        let mut points: Vec<TariffPoint> = groups
            .values()
            .flatten()
            .filter_map(|snapshot| {
                snapshot.reading(sensor_id).map(|reading| TariffPoint {
                    timestamp: snapshot.timestamp,
                    reading: *reading,
                })
            })
            .collect();
        points.sort_unstable_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn points(&self) -> &[TariffPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(timestamp, total)` pairs.
    pub fn total(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.points
            .iter()
            .map(|p| (p.timestamp, p.reading.total))
            .collect()
    }

    /// `(timestamp, high, low)` triples, parallel to [`Self::total`].
    pub fn high_low(&self) -> Vec<(DateTime<Utc>, f64, f64)> {
        self.points
            .iter()
            .map(|p| (p.timestamp, p.reading.high, p.reading.low))
            .collect()
    }

    pub fn project(&self, view: TariffView) -> Vec<(DateTime<Utc>, f64)> {
        self.points
            .iter()
            .map(|p| {
                let y = match view {
                    TariffView::Total => p.reading.total,
                    TariffView::High => p.reading.high,
                    TariffView::Low => p.reading.low,
                };
                (p.timestamp, y)
            })
            .collect()
    }
}

/// Register a tariff chart shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TariffView {
    #[default]
    Total,
    High,
    Low,
}
