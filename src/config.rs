use crate::error::{AppError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// OBIS classification code → sensor id.
pub type ObisTable = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ingest: IngestConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub consumption_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub consumption_extension: String,
    pub meter_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub meter_extension: String,
    #[serde(default)]
    pub batch_mode: BatchMode,
}

fn default_extension() -> String {
    "xml".into()
}

/// What a batch read does when one file fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Log the failure, drop that file, keep reading.
    #[default]
    Skip,
    /// Abort the batch at the first failing file.
    AllOrNothing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_obis_table")]
    pub obis: ObisTable,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            obis: default_obis_table(),
        }
    }
}

pub fn default_obis_table() -> ObisTable {
    [
        ("1-1:1.8.1", "ID742"),
        ("1-1:1.8.2", "ID742"),
        ("1-1:2.8.1", "ID735"),
        ("1-1:2.8.2", "ID735"),
    ]
    .into_iter()
    .map(|(code, sensor)| (code.to_string(), sensor.to_string()))
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub format: ExportFormat,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("export")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
            format: ExportFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// Afterwards CONSUMPTION_DIR and METER_DIR, when set, override the ingest directories.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        if let Ok(dir) = std::env::var("CONSUMPTION_DIR") {
            cfg.ingest.consumption_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("METER_DIR") {
            cfg.ingest.meter_dir = PathBuf::from(dir);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.ingest.consumption_dir.as_os_str().is_empty() {
            return Err(AppError::Config(
                "ingest.consumption_dir cannot be empty".to_string(),
            ));
        }
        if self.ingest.meter_dir.as_os_str().is_empty() {
            return Err(AppError::Config(
                "ingest.meter_dir cannot be empty".to_string(),
            ));
        }
        if self.ingest.consumption_extension.trim().is_empty()
            || self.ingest.meter_extension.trim().is_empty()
        {
            return Err(AppError::Config(
                "ingest file extensions cannot be empty".to_string(),
            ));
        }
        if self.sensors.obis.is_empty() {
            return Err(AppError::Config(
                "sensors.obis must map at least one code".to_string(),
            ));
        }
        if let Some((code, _)) = self
            .sensors
            .obis
            .iter()
            .find(|(_, sensor)| sensor.trim().is_empty())
        {
            return Err(AppError::Config(format!(
                "sensors.obis code '{}' maps to an empty sensor id",
                code
            )));
        }
        Ok(())
    }

    /// Sensor ids named by the OBIS table, deduplicated and sorted.
    pub fn configured_sensors(&self) -> Vec<String> {
        let mut sensors: Vec<String> = self.sensors.obis.values().cloned().collect();
        sensors.sort();
        sensors.dedup();
        sensors
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables. `$$` is a literal `$`.
fn expand_env_placeholders(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close).ok_or_else(|| {
            AppError::Config(format!("unterminated env placeholder: missing '{}'", close))
        })?;
        let val = std::env::var(&var)
            .map_err(|_| AppError::Config(format!("missing environment variable: {}", var)))?;
        out.push_str(&val);
    }

    Ok(out)
}

fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const MINIMAL: &str = r#"
ingest:
  consumption_dir: "data/SDAT-Files"
  meter_dir: "data/ESL-Files"
"#;

    #[test]
    #[serial]
    fn test_defaults_applied() {
        let cfg = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(cfg.ingest.consumption_extension, "xml");
        assert_eq!(cfg.ingest.batch_mode, BatchMode::Skip);
        assert_eq!(cfg.export.format, ExportFormat::Csv);
        assert_eq!(cfg.export.dir, PathBuf::from("export"));
        assert_eq!(cfg.configured_sensors(), vec!["ID735", "ID742"]);
    }

    #[test]
    #[serial]
    fn test_expand_placeholders() {
        std::env::set_var("MV_TEST_ROOT", "/srv/meter");
        let out = expand_env_placeholders("a: $(MV_TEST_ROOT)/x\nb: ${MV_TEST_ROOT}\nc: $$5 $x").unwrap();
        assert_eq!(out, "a: /srv/meter/x\nb: /srv/meter\nc: $5 $x");
        std::env::remove_var("MV_TEST_ROOT");
    }

    #[test]
    #[serial]
    fn test_missing_env_var_is_config_error() {
        std::env::remove_var("MV_TEST_DEFINITELY_UNSET");
        let err = expand_env_placeholders("a: ${MV_TEST_DEFINITELY_UNSET}").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = expand_env_placeholders("a: $(UNTERMINATED").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_empty_obis_table_rejected() {
        let yaml = r#"
ingest:
  consumption_dir: "a"
  meter_dir: "b"
sensors:
  obis: {}
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_export_format_names() {
        assert_eq!(ExportFormat::from_str("JSON", true).unwrap(), ExportFormat::Json);
        assert!(ExportFormat::from_str("xlsx", true).is_err());

        let cfg: ExportConfig = serde_yaml::from_str("format: json").unwrap();
        assert_eq!(cfg.format, ExportFormat::Json);
    }
}
