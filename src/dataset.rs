//! One loaded dataset and the handle that swaps it on reload.
//!
//! A [`Dataset`] is built once from parsed records and never mutated. Reloading
//! builds a new one and swaps it into the [`DatasetHandle`]; readers holding
//! the previous `Arc` keep a consistent view until they drop it.

use crate::aggregate::SensorSeries;
use crate::dedup::{dedupe_documents, dedupe_snapshots};
use crate::error::{AppError, Result};
use crate::grouping::{group_by_month, SensorTariffSeries};
use crate::models::{ConsumptionDocument, MeterSnapshot};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    documents: Vec<ConsumptionDocument>,
    snapshots: Vec<MeterSnapshot>,
    sensors: BTreeSet<String>,
    consumption: BTreeMap<String, SensorSeries>,
    tariffs: BTreeMap<String, SensorTariffSeries>,
}

/// Per-sensor counts, for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSummary {
    pub sensor_id: String,
    pub documents: usize,
    pub intervals: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub tariff_points: usize,
}

impl Dataset {
    /// Deduplicate, aggregate and group in one pass over the input.
    ///
    /// `known_sensors` adds sensors that exist even without data, typically
    /// those named by the OBIS table.
    pub fn build<I, S>(
        documents: Vec<ConsumptionDocument>,
        snapshots: Vec<MeterSnapshot>,
        known_sensors: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents = dedupe_documents(documents);
        let snapshots = dedupe_snapshots(snapshots);

        let mut sensors: BTreeSet<String> = known_sensors.into_iter().map(Into::into).collect();
        sensors.extend(documents.iter().map(|d| d.sensor_id().to_string()));
        sensors.extend(snapshots.iter().flat_map(|s| s.readings.keys().cloned()));

        let mut by_sensor: BTreeMap<&str, Vec<&ConsumptionDocument>> = BTreeMap::new();
        for doc in &documents {
            by_sensor.entry(doc.sensor_id()).or_default().push(doc);
        }
        let consumption: BTreeMap<String, SensorSeries> = by_sensor
            .into_iter()
            .map(|(sensor, docs)| {
                let series = SensorSeries::from_entries(docs.iter().flat_map(|d| d.entries.iter()));
                (sensor.to_string(), series)
            })
            .collect();

        let tariffs: BTreeMap<String, SensorTariffSeries> = {
            let groups = group_by_month(&snapshots);
            sensors
                .iter()
                .map(|s| (s.clone(), SensorTariffSeries::collect(&groups, s)))
                .collect()
        };

        info!(
            documents = documents.len(),
            snapshots = snapshots.len(),
            sensors = sensors.len(),
            with_consumption = consumption.len(),
            "dataset built"
        );

        Self {
            documents,
            snapshots,
            sensors,
            consumption,
            tariffs,
        }
    }

    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(String::as_str)
    }

    pub fn contains_sensor(&self, sensor_id: &str) -> bool {
        self.sensors.contains(sensor_id)
    }

    fn ensure_known(&self, sensor_id: &str) -> Result<()> {
        if self.contains_sensor(sensor_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(sensor_id.to_string()))
        }
    }

    /// Consumption rollup of a sensor. `Ok(None)` means the sensor is known but
    /// no document reported for it.
    pub fn sensor_series(&self, sensor_id: &str) -> Result<Option<&SensorSeries>> {
        self.ensure_known(sensor_id)?;
        Ok(self.consumption.get(sensor_id))
    }

    pub fn tariff_series(&self, sensor_id: &str) -> Result<&SensorTariffSeries> {
        self.ensure_known(sensor_id)?;
        self.tariffs
            .get(sensor_id)
            .ok_or_else(|| AppError::NotFound(sensor_id.to_string()))
    }

    /// Deduplicated consumption documents, in ingestion order.
    pub fn documents(&self) -> &[ConsumptionDocument] {
        &self.documents
    }

    /// Deduplicated meter snapshots, in ingestion order.
    pub fn snapshots(&self) -> &[MeterSnapshot] {
        &self.snapshots
    }

    pub fn summary(&self) -> Vec<SensorSummary> {
        self.sensors
            .iter()
            .map(|sensor| {
                let series = self.consumption.get(sensor);
                let span = series.and_then(SensorSeries::first_and_last);
                SensorSummary {
                    sensor_id: sensor.clone(),
                    documents: self
                        .documents
                        .iter()
                        .filter(|d| d.sensor_id() == sensor.as_str())
                        .count(),
                    intervals: series.map_or(0, |s| s.interval().len()),
                    first: span.map(|(first, _)| first),
                    last: span.map(|(_, last)| last),
                    tariff_points: self.tariffs.get(sensor).map_or(0, SensorTariffSeries::len),
                }
            })
            .collect()
    }
}

/// Shared, swappable reference to the current dataset.
pub struct DatasetHandle {
    current: ArcSwap<Dataset>,
}

impl DatasetHandle {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            current: ArcSwap::from_pointee(dataset),
        }
    }

    /// Snapshot of the dataset at the time of the call.
    pub fn current(&self) -> Arc<Dataset> {
        self.current.load_full()
    }

    /// Atomically replace the dataset; returns the previous one.
    pub fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let previous = self.current.swap(Arc::new(dataset));
        info!("dataset replaced");
        previous
    }
}

impl Default for DatasetHandle {
    fn default() -> Self {
        Self::new(Dataset::default())
    }
}
