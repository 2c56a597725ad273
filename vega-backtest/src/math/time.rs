//! Calendar conventions.
//!
//! Everything in the crate uses Actual/365: option time-to-expiry, theta
//! (per calendar day) and the annualization of backtest statistics.

use chrono::NaiveDate;

/// Calendar days per year.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Signed number of calendar days from `start` to `end`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Actual/365 year fraction, zero when `end` precedes `start`.
pub fn year_fraction(start: NaiveDate, end: NaiveDate) -> f64 {
    days_between(start, end).max(0) as f64 / DAYS_PER_YEAR
}
