// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as RFC3339 (UTC).
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Current time as RFC3339 (UTC) with milliseconds, for pacing.
pub fn now_rfc3339_millis() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Apply `hour:minute` to the day of `now`, rolling to the next day when
/// that moment has already passed.
///
/// Returns `None` for an out-of-range hour or minute.
pub fn next_occurrence(now: NaiveDateTime, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = now.date().and_time(time);
    if today < now {
        Some(today + Duration::days(1))
    } else {
        Some(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn later_today_stays_today() {
        let pickup = next_occurrence(at(9, 0), 12, 30).unwrap();
        assert_eq!(pickup, at(12, 30));
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        let pickup = next_occurrence(at(13, 0), 12, 30).unwrap();
        assert_eq!(pickup.date(), NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        assert_eq!(pickup.time(), NaiveTime::from_hms_opt(12, 30, 0).unwrap());
    }

    #[test]
    fn same_minute_is_not_past() {
        assert_eq!(next_occurrence(at(12, 30), 12, 30).unwrap(), at(12, 30));
    }

    #[test]
    fn invalid_time_rejected() {
        assert!(next_occurrence(at(8, 0), 25, 0).is_none());
        assert!(next_occurrence(at(8, 0), 10, 60).is_none());
    }
}
