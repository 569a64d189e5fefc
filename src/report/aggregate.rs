use std::{collections::BTreeMap, sync::Arc};

use chrono::{Datelike, NaiveDate};

use crate::{
    storage::entities::LogRecord,
    utils::{
        percentage::{seconds_percentage, Percentage},
        time::week_start,
    },
};

/// Result of a report query. Having nothing to report is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Report<T> {
    NoData,
    Data(T),
}

impl<T> Report<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Report::NoData => None,
            Report::Data(v) => Some(v),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Report::NoData)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityShare {
    pub activity: Arc<str>,
    pub seconds: u64,
    pub percentage: Percentage,
}

/// Time per activity, largest first. Equal totals are ordered by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    pub total_seconds: u64,
    pub activities: Vec<ActivityShare>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Only days that have records, in calendar order.
    pub days: Vec<DayTotal>,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub breakdown: Breakdown,
}

/// Records whose calendar date lies within `start..=end`.
fn between(
    records: &[LogRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = &LogRecord> + Clone {
    records
        .iter()
        .filter(move |v| start <= v.date && v.date <= end)
}

/// Groups records by activity. Returns [None] when there are no records at all.
fn breakdown<'a>(records: impl Iterator<Item = &'a LogRecord>) -> Option<Breakdown> {
    let mut map = BTreeMap::<Arc<str>, u64>::new();
    let mut total_seconds = 0u64;

    for v in records {
        // Hand edited logs may hold absurd values, they must not overflow the sums.
        total_seconds = total_seconds.saturating_add(v.duration_seconds);
        let seconds = map.entry(v.activity_name.clone()).or_default();
        *seconds = seconds.saturating_add(v.duration_seconds);
    }

    if map.is_empty() {
        return None;
    }

    let mut activities = map
        .into_iter()
        .map(|(activity, seconds)| ActivityShare {
            activity,
            seconds,
            percentage: seconds_percentage(seconds, total_seconds),
        })
        .collect::<Vec<_>>();
    activities.sort_by(|a, b| {
        b.seconds
            .cmp(&a.seconds)
            .then_with(|| a.activity.cmp(&b.activity))
    });

    Some(Breakdown {
        total_seconds,
        activities,
    })
}

pub fn daily(records: &[LogRecord], today: NaiveDate) -> Report<DailyReport> {
    match breakdown(between(records, today, today)) {
        Some(breakdown) => Report::Data(DailyReport {
            date: today,
            breakdown,
        }),
        None => Report::NoData,
    }
}

/// Monday of the current week through `today`.
pub fn weekly(records: &[LogRecord], today: NaiveDate) -> Report<WeeklyReport> {
    let start = week_start(today);
    let in_week = between(records, start, today);

    let Some(breakdown) = breakdown(in_week.clone()) else {
        return Report::NoData;
    };

    let mut days = BTreeMap::<NaiveDate, u64>::new();
    for v in in_week {
        let seconds = days.entry(v.date).or_default();
        *seconds = seconds.saturating_add(v.duration_seconds);
    }

    Report::Data(WeeklyReport {
        start,
        end: today,
        days: days
            .into_iter()
            .map(|(date, seconds)| DayTotal { date, seconds })
            .collect(),
        breakdown,
    })
}

/// First day of the current month through `today`.
pub fn monthly(records: &[LogRecord], today: NaiveDate) -> Report<MonthlyReport> {
    let start = today.with_day(1).unwrap_or(today);
    match breakdown(between(records, start, today)) {
        Some(breakdown) => Report::Data(MonthlyReport {
            start,
            end: today,
            breakdown,
        }),
        None => Report::NoData,
    }
}

/// Seconds tracked on `today`.
pub fn today_total(records: &[LogRecord], today: NaiveDate) -> u64 {
    between(records, today, today)
        .fold(0u64, |total, v| total.saturating_add(v.duration_seconds))
}
