#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Date range calculation for report queries.
//!
//! Pure functions producing inclusive date windows and enumerated day
//! lists. Named presets (yesterday, last month, quarters, ISO weeks, …)
//! are resolved against a "today" reference captured once per process, so
//! every query in a run sees the same boundaries. All windows are whole
//! calendar days; there is no sub-day resolution.

pub mod presets;

use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use ga_query_models::DateWindow;

/// ISO date format used everywhere on the wire.
pub const ISO_DATE: &str = "%Y-%m-%d";

static TODAY: LazyLock<NaiveDate> = LazyLock::new(|| Local::now().date_naive());

/// Errors from date range calculation.
#[derive(Debug, thiserror::Error)]
pub enum DateRangeError {
    /// A date string did not parse as `%Y-%m-%d`.
    #[error("'{input}' is not a valid ISO date: {source}")]
    InvalidDate {
        /// The offending input.
        input: String,
        /// Underlying parse failure.
        source: chrono::ParseError,
    },

    /// The requested window cannot yield any results.
    #[error("Invalid date range: {message}")]
    InvalidRange {
        /// Description of what went wrong.
        message: String,
    },
}

/// The "today" reference all presets are derived from, captured once per
/// process run.
#[must_use]
pub fn today() -> NaiveDate {
    *TODAY
}

/// Parses an ISO `%Y-%m-%d` date string.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidDate`] if the string is malformed.
pub fn parse_iso(input: &str) -> Result<NaiveDate, DateRangeError> {
    NaiveDate::parse_from_str(input, ISO_DATE).map_err(|source| DateRangeError::InvalidDate {
        input: input.to_owned(),
        source,
    })
}

/// Enumerates every calendar day between the two bounds (inclusive),
/// formatted as ISO date strings, **most recent first**.
///
/// Bounds given out of order are normalized; equal bounds yield a
/// single-element list.
#[must_use]
pub fn day_list(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let window = DateWindow::new(start, end);
    let days = i64::try_from(window.len_days()).unwrap_or(i64::MAX);
    (0..days)
        .map(|offset| {
            (window.end - chrono::Duration::days(offset))
                .format(ISO_DATE)
                .to_string()
        })
        .collect()
}

/// [`day_list`] over an already-built [`DateWindow`].
#[must_use]
pub fn window_days(window: &DateWindow) -> Vec<String> {
    day_list(window.start, window.end)
}

/// [`day_list`] over ISO date strings.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidDate`] if either bound is malformed.
pub fn day_list_str(start: &str, end: &str) -> Result<Vec<String>, DateRangeError> {
    Ok(day_list(parse_iso(start)?, parse_iso(end)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_list_is_inclusive_and_descending() {
        let days = day_list(date(2024, 2, 27), date(2024, 3, 2));
        assert_eq!(
            days,
            vec!["2024-03-02", "2024-03-01", "2024-02-29", "2024-02-28", "2024-02-27"]
        );
    }

    #[test]
    fn day_list_counts_match_window_length() {
        let start = date(2023, 11, 5);
        let end = date(2024, 1, 17);
        let days = day_list(start, end);
        assert_eq!(days.len() as u64, DateWindow::new(start, end).len_days());
        for pair in days.windows(2) {
            assert!(pair[0] > pair[1], "expected descending order: {pair:?}");
        }
    }

    #[test]
    fn day_list_single_day() {
        assert_eq!(day_list(date(2024, 3, 10), date(2024, 3, 10)), vec!["2024-03-10"]);
    }

    #[test]
    fn day_list_normalizes_reversed_bounds() {
        let forward = day_list(date(2024, 1, 1), date(2024, 1, 5));
        let reversed = day_list(date(2024, 1, 5), date(2024, 1, 1));
        assert_eq!(forward, reversed);
    }

    #[test]
    fn parse_iso_rejects_garbage() {
        assert!(matches!(
            parse_iso("03/10/2024"),
            Err(DateRangeError::InvalidDate { .. })
        ));
        assert!(day_list_str("2024-01-01", "not-a-date").is_err());
    }

    #[test]
    fn day_list_str_parses_bounds() {
        let days = day_list_str("2024-01-01", "2024-01-03").unwrap();
        assert_eq!(days, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);
    }
}
