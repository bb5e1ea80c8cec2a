//! Viewport queries: pick the precomputed tier that fits the visible span.
//!
//! | visible span (whole days) | tier       | filtered to window |
//! |---------------------------|------------|--------------------|
//! | no window                 | `year`     | no                 |
//! | `> 730`                   | `year`     | no                 |
//! | `61..=730`                | `month`    | first of month     |
//! | `3..=60`                  | `day`      | midnight           |
//! | `0..=2`                   | `interval` | timestamp          |

use crate::aggregate::{day_start, month_start, year_start, SensorSeries};
use crate::dataset::{Dataset, DatasetHandle};
use crate::error::Result;
use crate::grouping::SensorTariffSeries;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Consumption rollups from interval documents.
    Trend,
    /// Register readings from billing snapshots.
    Tariff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Year,
    Month,
    Day,
    Interval,
}

impl Tier {
    pub const YEAR_ABOVE_DAYS: i64 = 730;
    pub const MONTH_ABOVE_DAYS: i64 = 60;
    pub const DAY_ABOVE_DAYS: i64 = 2;

    /// Bands are lower-exclusive, upper-inclusive.
    pub fn for_span(range_days: i64) -> Self {
        if range_days > Self::YEAR_ABOVE_DAYS {
            Tier::Year
        } else if range_days > Self::MONTH_ABOVE_DAYS {
            Tier::Month
        } else if range_days > Self::DAY_ABOVE_DAYS {
            Tier::Day
        } else {
            Tier::Interval
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Year => "year",
            Tier::Month => "month",
            Tier::Day => "day",
            Tier::Interval => "interval",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Visible x-axis window reported by a chart. Either bound may be missing,
/// in which case the window is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedRange {
    pub x_min: Option<DateTime<Utc>>,
    pub x_max: Option<DateTime<Utc>>,
}

impl RequestedRange {
    pub fn new(x_min: DateTime<Utc>, x_max: DateTime<Utc>) -> Self {
        Self {
            x_min: Some(x_min),
            x_max: Some(x_max),
        }
    }

    /// Build from raw axis strings. An unparseable bound counts as missing.
    pub fn parse(x_min: Option<&str>, x_max: Option<&str>) -> Self {
        Self {
            x_min: x_min.and_then(parse_axis_instant),
            x_max: x_max.and_then(parse_axis_instant),
        }
    }

    /// Both bounds in ascending order, or `None` when either is missing.
    /// Reversed bounds are swapped.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (a, b) = (self.x_min?, self.x_max?);
        Some(if b < a { (b, a) } else { (a, b) })
    }

    /// Whole days between the bounds, rounded down.
    pub fn range_days(&self) -> Option<i64> {
        self.bounds().map(|(lo, hi)| (hi - lo).num_days())
    }
}

/// Parse an axis bound as sent by charting front ends.
pub fn parse_axis_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(day_start)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub x: DateTime<Utc>,
    pub y: f64,
}

/// Consumption points at one tier, ascending by `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub sensor_id: String,
    pub tier: Tier,
    pub points: Vec<SeriesPoint>,
    /// Axis window the points were selected for. Advisory for the `year` tier.
    pub x_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// The sensor is known but no consumption document reported for it.
    pub no_data: bool,
}

impl Series {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn xs(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

/// Tariff history for one sensor; both presentations come from `series`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffSeries {
    pub sensor_id: String,
    #[serde(flatten)]
    pub series: SensorTariffSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryResult {
    Trend(Series),
    Tariff(TariffSeries),
}

impl QueryResult {
    pub fn as_trend(&self) -> Option<&Series> {
        match self {
            QueryResult::Trend(s) => Some(s),
            QueryResult::Tariff(_) => None,
        }
    }

    pub fn as_tariff(&self) -> Option<&TariffSeries> {
        match self {
            QueryResult::Tariff(t) => Some(t),
            QueryResult::Trend(_) => None,
        }
    }
}

impl Dataset {
    /// What to plot for `sensor_id` in the given window.
    ///
    /// Unknown sensors fail with [`crate::AppError::NotFound`]. A window without
    /// points yields an empty series, not an error. Tariff charts ignore the window.
    pub fn query(
        &self,
        sensor_id: &str,
        kind: ChartKind,
        range: Option<&RequestedRange>,
    ) -> Result<QueryResult> {
        match kind {
            ChartKind::Trend => self.trend(sensor_id, range).map(QueryResult::Trend),
            ChartKind::Tariff => {
                let series = self.tariff_series(sensor_id)?;
                debug!(sensor_id, points = series.len(), "tariff query");
                Ok(QueryResult::Tariff(TariffSeries {
                    sensor_id: sensor_id.to_string(),
                    series: series.clone(),
                }))
            }
        }
    }

    fn trend(&self, sensor_id: &str, range: Option<&RequestedRange>) -> Result<Series> {
        let series = self.sensor_series(sensor_id)?;
        let x_range = range.and_then(RequestedRange::bounds);
        let tier = match x_range {
            Some((lo, hi)) => Tier::for_span((hi - lo).num_days()),
            None => Tier::Year,
        };

        let points = series
            .map(|s| select_points(s, tier, x_range))
            .unwrap_or_default();
        debug!(sensor_id, %tier, points = points.len(), "trend query");

        Ok(Series {
            sensor_id: sensor_id.to_string(),
            tier,
            points,
            x_range,
            no_data: series.is_none(),
        })
    }
}

impl DatasetHandle {
    /// Query against the dataset current at call time.
    pub fn query(
        &self,
        sensor_id: &str,
        kind: ChartKind,
        range: Option<&RequestedRange>,
    ) -> Result<QueryResult> {
        self.current().query(sensor_id, kind, range)
    }
}

fn select_points(
    series: &SensorSeries,
    tier: Tier,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<SeriesPoint> {
    let within = |x: &DateTime<Utc>| window.map_or(true, |(lo, hi)| lo <= *x && *x <= hi);

    match tier {
        // The overview tier is never cut to the window.
        Tier::Year => series
            .year()
            .iter()
            .filter_map(|(year, y)| year_start(*year).map(|x| SeriesPoint { x, y: *y }))
            .collect(),
        Tier::Month => series
            .month()
            .iter()
            .filter_map(|(ym, y)| month_start(*ym).map(|x| SeriesPoint { x, y: *y }))
            .filter(|p| within(&p.x))
            .collect(),
        Tier::Day => series
            .day()
            .iter()
            .map(|(date, y)| SeriesPoint {
                x: day_start(*date),
                y: *y,
            })
            .filter(|p| within(&p.x))
            .collect(),
        Tier::Interval => match window {
            Some((lo, hi)) => series
                .interval()
                .range(lo..=hi)
                .map(|(x, y)| SeriesPoint { x: *x, y: *y })
                .collect(),
            None => series
                .interval()
                .iter()
                .map(|(x, y)| SeriesPoint { x: *x, y: *y })
                .collect(),
        },
    }
}
