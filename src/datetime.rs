//! Calendar helpers for the configured timezone.
//!
//! All day and month boundaries are computed in the tracker's timezone, not
//! UTC: an article detected at 23:30 UTC may already belong to tomorrow.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

/// Date format used for the `date` columns in the store.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date of `now` in `tz`.
pub fn local_date(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// First day of the month containing `date`.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month following the one containing `date`.
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Format a date for storage.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Format a UTC instant in `tz` for display.
pub fn format_local(dt: DateTime<Utc>, tz: Tz, format: &str) -> String {
    dt.with_timezone(&tz).format(format).to_string()
}
