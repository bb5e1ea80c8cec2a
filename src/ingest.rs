use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::parse::{read_consumption_files, read_meter_files, scan_dir};
use tracing::{info, warn};

/// Read both source directories and build a dataset from everything that parsed.
pub fn load_dataset(config: &Config) -> Result<Dataset> {
    let ingest = &config.ingest;

    let consumption_paths = scan_dir(&ingest.consumption_dir, &ingest.consumption_extension)?;
    let meter_paths = scan_dir(&ingest.meter_dir, &ingest.meter_extension)?;
    info!(
        consumption_files = consumption_paths.len(),
        meter_files = meter_paths.len(),
        mode = ?ingest.batch_mode,
        "loading dataset"
    );

    let consumption = read_consumption_files(&consumption_paths, ingest.batch_mode)?;
    let meters = read_meter_files(&meter_paths, ingest.batch_mode, &config.sensors.obis)?;

    if !(consumption.is_complete() && meters.is_complete()) {
        warn!(
            skipped_consumption = consumption.failures.len(),
            skipped_meter = meters.failures.len(),
            "some files could not be read"
        );
    }

    Ok(Dataset::build(
        consumption.records,
        meters.records,
        config.configured_sensors(),
    ))
}
