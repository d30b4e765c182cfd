use chrono::{DateTime, Duration, Local};

use crate::{
    config::TimeConfig,
    records::DomainTimeRecord,
    report::weekly_summary,
    utils::time::{format_duration, is_today},
};

/// Prints today's active time per domain, most used first, with the
/// matching budget where one exists.
pub fn print_usage(records: &[DomainTimeRecord], config: &TimeConfig, now: DateTime<Local>) {
    // today_seconds is only recomputed on write, so count fresh here.
    let mut usage: Vec<(&str, i64)> = records
        .iter()
        .map(|record| {
            let seconds = record
                .timestamps
                .iter()
                .filter(|&&t| is_today(t, now.to_utc()))
                .count() as i64;
            (record.domain.as_str(), seconds)
        })
        .filter(|(_, seconds)| *seconds > 0)
        .collect();
    usage.sort_by(|a, b| b.1.cmp(&a.1));

    if usage.is_empty() {
        println!("No activity recorded today");
        return;
    }

    for (domain, seconds) in usage {
        let budget = config
            .time_limit_for(domain)
            .map(|limit| format_duration(Duration::milliseconds(limit as i64)))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}",
            format_duration(Duration::seconds(seconds)),
            budget,
            domain
        );
    }
}

/// Prints per-day domain shares for the last 7 days, oldest day first.
pub fn print_weekly(records: &[DomainTimeRecord], now: DateTime<Local>) {
    for day in weekly_summary(records, now) {
        if day.total_ms == 0 {
            continue;
        }

        println!(
            "{} ({})",
            day.label,
            format_duration(Duration::milliseconds(day.total_ms as i64))
        );
        for share in day.domains {
            println!(
                "\t{}%\t{}\t{}",
                share.percentage as i32,
                format_duration(Duration::milliseconds(share.time_ms as i64)),
                share.domain
            );
        }
        println!();
    }
}

/// Prints configured budgets in matching order.
pub fn print_limits(config: &TimeConfig) {
    if config.domain_configs.is_empty() {
        println!("No domain budgets configured");
        return;
    }

    for dc in &config.domain_configs {
        println!(
            "{}\t{}\t{}",
            format_duration(Duration::milliseconds(dc.time_limit as i64)),
            if dc.enabled { "enabled" } else { "disabled" },
            dc.domain
        );
    }
}
