pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod dedup;
pub mod error;
pub mod export;
pub mod grouping;
pub mod ingest;
pub mod models;
pub mod parse;
pub mod query;

// Re-export commonly used items
pub use config::{BatchMode, Config, ExportFormat};
pub use dataset::{Dataset, DatasetHandle, SensorSummary};
pub use error::{AppError, Result};
pub use grouping::TariffView;
pub use ingest::load_dataset;
pub use query::{ChartKind, QueryResult, RequestedRange, Series, TariffSeries, Tier};
