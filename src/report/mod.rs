//! Read-side aggregation over the record collection. Pure functions; the
//! display layer polls the store on its own and never writes usage data.

use chrono::{DateTime, Duration, Local};
use now::DateTimeNow;

use crate::{records::DomainTimeRecord, utils::time::next_day_start};

pub const REPORT_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct DomainShare {
    pub domain: String,
    pub time_ms: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub day_start: DateTime<Local>,
    pub label: String,
    pub domains: Vec<DomainShare>,
    pub total_ms: u64,
}

/// Per-day domain shares for the last [REPORT_DAYS] days, oldest first. A
/// timestamp contributes one second to the day it falls into.
pub fn weekly_summary(records: &[DomainTimeRecord], now: DateTime<Local>) -> Vec<DaySummary> {
    (0..REPORT_DAYS)
        .rev()
        .map(|days_back| {
            let day_start = (now - Duration::days(days_back)).beginning_of_day();
            day_summary(records, day_start, now)
        })
        .collect()
}

fn day_summary(
    records: &[DomainTimeRecord],
    day_start: DateTime<Local>,
    now: DateTime<Local>,
) -> DaySummary {
    let from = day_start.timestamp_millis();
    let to = next_day_start(day_start).timestamp_millis();

    let mut domains: Vec<DomainShare> = records
        .iter()
        .filter_map(|record| {
            let ticks = record
                .timestamps
                .iter()
                .filter(|&&t| t >= from && t < to)
                .count() as u64;
            (ticks > 0).then(|| DomainShare {
                domain: record.domain.clone(),
                time_ms: ticks * 1000,
                percentage: 0.,
            })
        })
        .collect();

    let total_ms: u64 = domains.iter().map(|d| d.time_ms).sum();
    if total_ms > 0 {
        for share in &mut domains {
            share.percentage = share.time_ms as f64 / total_ms as f64 * 100.;
        }
    }
    domains.sort_by(|a, b| b.time_ms.cmp(&a.time_ms));

    DaySummary {
        day_start,
        label: day_label(day_start, now),
        domains,
        total_ms,
    }
}

/// "today" / "yesterday" for the two most recent days, a short date for the
/// rest.
pub fn day_label(day_start: DateTime<Local>, now: DateTime<Local>) -> String {
    let today = now.beginning_of_day();
    if day_start == today {
        "today".to_string()
    } else if day_start == today - Duration::days(1) {
        "yesterday".to_string()
    } else {
        day_start.format("%d %b").to_string()
    }
}
