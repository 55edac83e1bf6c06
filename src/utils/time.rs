// src/utils/time.rs

//! Civil-time helpers for the single timezone the timetable lives in.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Timezone of the university timetable.
pub const TIMEZONE: Tz = chrono_tz::Europe::Kyiv;

/// Current instant expressed in timetable civil time.
pub fn now_local() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&TIMEZONE).fixed_offset()
}

/// Today's date in timetable civil time.
pub fn today() -> NaiveDate {
    now_local().date_naive()
}

/// Attach the timetable timezone to a wall-clock date and time.
///
/// Returns `None` for wall-clock times skipped by a DST transition. For
/// repeated times the earlier instant wins.
pub fn localize(date: NaiveDate, time: NaiveTime) -> Option<DateTime<FixedOffset>> {
    localize_naive(date.and_time(time))
}

/// Attach the timetable timezone to a naive datetime.
pub fn localize_naive(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    TIMEZONE
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Parse an `HH:MM` wall-clock time.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localize_summer_and_winter_offsets() {
        let summer = localize(
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(summer.offset().local_minus_utc(), 3 * 3600);

        let winter = localize(
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(winter.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_localize_skipped_time() {
        // 2026-03-29 03:30 does not exist in Kyiv (clocks jump 03:00 -> 04:00)
        let missing = localize(
            NaiveDate::from_ymd_opt(2026, 3, 29).unwrap(),
            NaiveTime::from_hms_opt(3, 30, 0).unwrap(),
        );
        assert!(missing.is_none());
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm(" 05:00 "), NaiveTime::from_hms_opt(5, 0, 0));
        assert!(parse_hhmm("25:00").is_none());
        assert!(parse_hhmm("noon").is_none());
    }
}
