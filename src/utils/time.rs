use chrono::{DateTime, Datelike, Duration, Local, NaiveTime, TimeZone, Utc};

/// Local calendar-day equality. Comparison is on year/month/day only, so a
/// timestamp one millisecond before midnight belongs to the previous day.
pub fn is_same_day<Tz: TimeZone>(a: DateTime<Tz>, b: DateTime<Tz>) -> bool {
    a.day() == b.day() && a.month() == b.month() && a.year() == b.year()
}

/// Whether an epoch-millisecond timestamp falls on the same local calendar
/// day as `now`.
pub fn is_today(timestamp_millis: i64, now: DateTime<Utc>) -> bool {
    let Some(moment) = DateTime::<Utc>::from_timestamp_millis(timestamp_millis) else {
        return false;
    };
    is_same_day(moment.with_timezone(&Local), now.with_timezone(&Local))
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
