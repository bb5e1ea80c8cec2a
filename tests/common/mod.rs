#![allow(dead_code)]

use meter_viewport::config::{ExportConfig, IngestConfig, SensorConfig};
use meter_viewport::{BatchMode, Config};
use std::path::Path;

/// SDAT document with a 15 minute grid starting at `start`.
pub fn sdat_xml(document_id: &str, start: &str, end: &str, volumes: &[&str]) -> String {
    let observations: String = volumes
        .iter()
        .enumerate()
        .map(|(i, v)| {
            format!(
                "<rsm:Observation><rsm:Position><rsm:Sequence>{}</rsm:Sequence></rsm:Position><rsm:Volume>{}</rsm:Volume></rsm:Observation>\n",
                i + 1,
                v
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rsm:ValidatedMeteredData_12 xmlns:rsm="http://www.strom.ch">
  <rsm:ValidatedMeteredData_HeaderInformation>
    <rsm:InstanceDocument>
      <rsm:DocumentID>{document_id}</rsm:DocumentID>
    </rsm:InstanceDocument>
  </rsm:ValidatedMeteredData_HeaderInformation>
  <rsm:MeteringData>
    <rsm:Interval>
      <rsm:StartDateTime>{start}</rsm:StartDateTime>
      <rsm:EndDateTime>{end}</rsm:EndDateTime>
    </rsm:Interval>
    <rsm:Resolution><rsm:Resolution>15</rsm:Resolution><rsm:Unit>MIN</rsm:Unit></rsm:Resolution>
{observations}  </rsm:MeteringData>
</rsm:ValidatedMeteredData_12>"#
    )
}

/// ESL billing file with one period ending at `end` and `(obis, value, status)` rows.
pub fn esl_xml(end: &str, rows: &[(&str, &str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(obis, value, status)| {
            format!(r#"      <ValueRow obis="{obis}" value="{value}" status="{status}"/>"#) + "\n"
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ESLBillingData version="1.0">
  <Meter factoryNo="1" internalNo="1">
    <TimePeriod end="{end}">
{rows}    </TimePeriod>
  </Meter>
</ESLBillingData>"#
    )
}

pub fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

pub fn config_for(consumption_dir: &Path, meter_dir: &Path, batch_mode: BatchMode) -> Config {
    Config {
        ingest: IngestConfig {
            consumption_dir: consumption_dir.to_path_buf(),
            consumption_extension: "xml".into(),
            meter_dir: meter_dir.to_path_buf(),
            meter_extension: "xml".into(),
            batch_mode,
        },
        sensors: SensorConfig::default(),
        export: ExportConfig::default(),
    }
}
