//! Utility functions for date and number normalization.

use chrono::NaiveDate;

/// Round to two decimal places, halves to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Calendar date of an API timestamp such as `start_date_local`.
///
/// Only the part before the first time separator is considered.
/// Accepts:
/// - `YYYY-MM-DDTHH:MM:SSZ` -> `YYYY-MM-DD`
/// - `YYYY-MM-DD HH:MM:SS` -> `YYYY-MM-DD`
/// - `YYYY-MM-DD`, `YYYY/MM/DD` and `YYYYMMDD`
pub fn parse_activity_date(s: &str) -> Option<NaiveDate> {
    let day = s.trim().split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day, "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(day, "%Y%m%d"))
        .ok()
}
