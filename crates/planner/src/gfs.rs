//! Grandfather-father-son bucket selection
//!
//! Timestamps are grouped into calendar buckets (ISO weeks starting Monday,
//! months, years). The `count` most recent buckets ending with the one that
//! contains the boundary are retained, and within each retained bucket the
//! latest timestamp at or before the boundary survives.

use crate::policy::RetentionPolicy;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};

/// Rotation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Week,
    Month,
    Year,
}

/// Calendar bucket a timestamp falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    /// ISO week, identified by its Monday
    Week(NaiveDate),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Week, Period::Month, Period::Year];

    /// Bucket containing `ts`
    pub fn bucket(self, ts: NaiveDateTime) -> Bucket {
        let date = ts.date();
        match self {
            Period::Week => Bucket::Week(week_start(date)),
            Period::Month => Bucket::Month {
                year: date.year(),
                month: date.month(),
            },
            Period::Year => Bucket::Year(date.year()),
        }
    }

    /// First instant of the oldest of `count` buckets ending at the bucket of `boundary`
    ///
    /// `count` must be at least 1.
    pub fn window_start(self, boundary: NaiveDateTime, count: u32) -> NaiveDateTime {
        let back = count.saturating_sub(1);
        let date = boundary.date();

        let start = match self {
            Period::Week => week_start(date).checked_sub_signed(Duration::weeks(i64::from(back))),
            Period::Month => {
                let months = i64::from(date.year()) * 12 + i64::from(date.month0()) - i64::from(back);
                i32::try_from(months.div_euclid(12))
                    .ok()
                    .and_then(|year| NaiveDate::from_ymd_opt(year, months.rem_euclid(12) as u32 + 1, 1))
            }
            Period::Year => i32::try_from(i64::from(date.year()) - i64::from(back))
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        };

        start
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Policy count for this period
    pub fn count(self, policy: &RetentionPolicy) -> u32 {
        match self {
            Period::Week => policy.weekly,
            Period::Month => policy.monthly,
            Period::Year => policy.yearly,
        }
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Latest timestamp per retained bucket of one period
///
/// Only timestamps at or before `boundary` are considered. `count == 0`
/// retains nothing.
pub fn select(
    timestamps: &[NaiveDateTime],
    period: Period,
    count: u32,
    boundary: NaiveDateTime,
) -> BTreeMap<Bucket, NaiveDateTime> {
    let mut latest = BTreeMap::new();
    if count == 0 {
        return latest;
    }

    let start = period.window_start(boundary, count);
    for &ts in timestamps.iter().filter(|&&ts| ts >= start && ts <= boundary) {
        latest
            .entry(period.bucket(ts))
            .and_modify(|kept: &mut NaiveDateTime| {
                if ts > *kept {
                    *kept = ts;
                }
            })
            .or_insert(ts);
    }
    latest
}

/// Union of the weekly, monthly and yearly selections
pub fn keep(
    timestamps: &[NaiveDateTime],
    policy: &RetentionPolicy,
    boundary: NaiveDateTime,
) -> BTreeSet<NaiveDateTime> {
    Period::ALL
        .iter()
        .flat_map(|&period| select(timestamps, period, period.count(policy), boundary).into_values())
        .collect()
}
