use crate::models::{ConsumptionEntry, YearMonth};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Four-tier consumption rollup for one sensor.
///
/// Each coarser tier is folded from the tier below it, so every day equals
/// the sum of its interval buckets, every month the sum of its days and every
/// year the sum of its months.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSeries {
    interval: BTreeMap<DateTime<Utc>, f64>,
    day: BTreeMap<NaiveDate, f64>,
    month: BTreeMap<YearMonth, f64>,
    year: BTreeMap<i32, f64>,
}

impl SensorSeries {
    /// Entries may arrive in any order. Entries sharing a timestamp add up.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a ConsumptionEntry>,
    {
        let mut interval: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        for entry in entries {
            *interval.entry(entry.timestamp).or_insert(0.0) += entry.volume;
        }

        let mut day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (ts, volume) in &interval {
            *day.entry(ts.date_naive()).or_insert(0.0) += volume;
        }

        let mut month: BTreeMap<YearMonth, f64> = BTreeMap::new();
        for (date, volume) in &day {
            *month.entry(YearMonth::of(date)).or_insert(0.0) += volume;
        }

        let mut year: BTreeMap<i32, f64> = BTreeMap::new();
        for (ym, volume) in &month {
            *year.entry(ym.year).or_insert(0.0) += volume;
        }

        Self {
            interval,
            day,
            month,
            year,
        }
    }

    pub fn interval(&self) -> &BTreeMap<DateTime<Utc>, f64> {
        &self.interval
    }

    pub fn day(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.day
    }

    pub fn month(&self) -> &BTreeMap<YearMonth, f64> {
        &self.month
    }

    pub fn year(&self) -> &BTreeMap<i32, f64> {
        &self.year
    }

    pub fn is_empty(&self) -> bool {
        self.interval.is_empty()
    }

    pub fn first_and_last(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.interval.keys().next()?;
        let last = self.interval.keys().next_back()?;
        Some((*first, *last))
    }
}

/// Midnight UTC of a calendar day.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// First instant of a month, or `None` for an impossible month.
pub fn month_start(ym: YearMonth) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(ym.year, ym.month, 1).map(day_start)
}

/// First instant of a year, or `None` outside chrono's range.
pub fn year_start(year: i32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(day_start)
}
