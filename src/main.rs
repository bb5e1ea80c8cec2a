use clap::{Parser, Subcommand};
use meter_viewport::{
    export, load_dataset, ChartKind, Config, ExportFormat, QueryResult, RequestedRange, TariffView,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Explore interval consumption and tariff meter readings")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "APP_CONFIG", default_value = "config/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Per-sensor counts of the loaded data
    Summary,
    /// Print what a chart should plot for a sensor and window, as JSON
    Query {
        #[arg(long)]
        sensor: String,
        #[arg(long, value_enum, ignore_case = true, default_value_t = ChartKind::Trend)]
        kind: ChartKind,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Tariff charts only
        #[arg(long, value_enum, ignore_case = true)]
        view: Option<TariffView>,
    },
    /// Dump the deduplicated input as CSV or JSON
    Export {
        /// Defaults to export.format from the configuration
        #[arg(long, value_enum, ignore_case = true)]
        format: Option<ExportFormat>,
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", cli.config.display(), e))?;
    info!("Configuration loaded");

    let dataset = load_dataset(&cfg)?;

    match cli.cmd {
        Cmd::Summary => {
            println!("{}", serde_json::to_string_pretty(&dataset.summary())?);
        }
        Cmd::Query {
            sensor,
            kind,
            from,
            to,
            view,
        } => {
            let range = RequestedRange::parse(from.as_deref(), to.as_deref());
            let result = dataset.query(&sensor, kind, Some(&range))?;

            let output = match (&result, view) {
                (QueryResult::Tariff(tariff), Some(view)) => {
                    let points: Vec<_> = tariff
                        .series
                        .project(view)
                        .into_iter()
                        .map(|(x, y)| json!({ "x": x, "y": y }))
                        .collect();
                    json!({ "kind": "tariff", "sensor_id": sensor, "view": view, "points": points })
                }
                _ => serde_json::to_value(&result)?,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Cmd::Export { format, dir } => {
            let format = format.unwrap_or(cfg.export.format);
            let dir = dir.unwrap_or_else(|| cfg.export.dir.clone());
            for path in export::export(&dataset, &dir, format)? {
                info!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
