//! Time formatting utilities.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Format the distance between `target` and `now` (past or future).
#[must_use]
pub fn format_relative_time(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(target);

    if duration.num_seconds().abs() < 60 {
        return "just now".to_string();
    }

    let minutes = duration.num_minutes().abs();
    let hours = duration.num_hours().abs();
    let days = duration.num_days().abs();

    let suffix = if duration.num_seconds() > 0 {
        "ago"
    } else {
        "from now"
    };

    if days > 0 {
        format!("{days} day{} {suffix}", if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("{hours} hour{} {suffix}", if hours == 1 { "" } else { "s" })
    } else {
        format!(
            "{minutes} minute{} {suffix}",
            if minutes == 1 { "" } else { "s" }
        )
    }
}

/// Midnight UTC on the first day of `now`'s month.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(now, |naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn relative_hours_ago() {
        let now = at("2026-03-10T12:00:00Z");
        assert_eq!(
            format_relative_time(now - Duration::hours(2), now),
            "2 hours ago"
        );
    }

    #[test]
    fn relative_just_now() {
        let now = at("2026-03-10T12:00:00Z");
        assert_eq!(
            format_relative_time(now - Duration::seconds(10), now),
            "just now"
        );
    }

    #[test]
    fn month_start_truncates() {
        let now = at("2026-03-10T12:34:56Z");
        assert_eq!(month_start(now), at("2026-03-01T00:00:00Z"));
    }
}
