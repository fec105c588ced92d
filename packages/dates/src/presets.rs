//! Named date-range presets.
//!
//! Every preset has a `*_from` form taking an explicit reference date and
//! a no-argument form bound to the process-wide [`today`](crate::today)
//! capture. Quarter and week lookups that would end in the future are
//! clamped to yesterday with a warning; a window entirely in the future
//! is an error, since it cannot yield any results.

use chrono::{Datelike as _, Duration, NaiveDate, Weekday};
use ga_query_models::DateWindow;

use crate::DateRangeError;

/// Yesterday as a single-day window.
#[must_use]
pub fn yesterday() -> DateWindow {
    yesterday_from(crate::today())
}

/// [`yesterday`] relative to an explicit reference date.
#[must_use]
pub fn yesterday_from(today: NaiveDate) -> DateWindow {
    let day = today - Duration::days(1);
    DateWindow { start: day, end: day }
}

/// The last complete week (Monday through Sunday before the current week).
#[must_use]
pub fn last_week() -> DateWindow {
    last_week_from(crate::today())
}

/// [`last_week`] relative to an explicit reference date.
#[must_use]
pub fn last_week_from(today: NaiveDate) -> DateWindow {
    let monday =
        today - Duration::days(i64::from(today.weekday().num_days_from_monday())) - Duration::weeks(1);
    DateWindow {
        start: monday,
        end: monday + Duration::days(6),
    }
}

/// The `n` days ending yesterday.
#[must_use]
pub fn last_n_days(n: u32) -> DateWindow {
    last_n_days_from(n, crate::today())
}

/// [`last_n_days`] relative to an explicit reference date.
#[must_use]
pub fn last_n_days_from(n: u32, today: NaiveDate) -> DateWindow {
    let end = today - Duration::days(1);
    DateWindow {
        start: end - Duration::days(i64::from(n.max(1)) - 1),
        end,
    }
}

/// The 7 days ending yesterday.
#[must_use]
pub fn last_7_days() -> DateWindow {
    last_n_days(7)
}

/// The 90 days ending yesterday.
#[must_use]
pub fn last_90_days() -> DateWindow {
    last_n_days(90)
}

/// The current month so far (1st through yesterday).
#[must_use]
pub fn this_month() -> DateWindow {
    this_month_from(crate::today())
}

/// [`this_month`] relative to an explicit reference date.
#[must_use]
pub fn this_month_from(today: NaiveDate) -> DateWindow {
    DateWindow {
        start: today.with_day(1).unwrap_or(today),
        end: today - Duration::days(1),
    }
}

/// The previous full calendar month.
#[must_use]
pub fn last_month() -> DateWindow {
    last_month_from(crate::today())
}

/// [`last_month`] relative to an explicit reference date.
#[must_use]
pub fn last_month_from(today: NaiveDate) -> DateWindow {
    let last_of_previous = today.with_day(1).unwrap_or(today) - Duration::days(1);
    DateWindow {
        start: last_of_previous.with_day(1).unwrap_or(last_of_previous),
        end: last_of_previous,
    }
}

/// The current year so far (January 1st through yesterday).
#[must_use]
pub fn this_year() -> DateWindow {
    this_year_from(crate::today())
}

/// [`this_year`] relative to an explicit reference date.
#[must_use]
pub fn this_year_from(today: NaiveDate) -> DateWindow {
    DateWindow {
        start: first_of_year(today.year()),
        end: today - Duration::days(1),
    }
}

/// The previous full calendar year.
#[must_use]
pub fn last_year() -> DateWindow {
    last_year_from(crate::today())
}

/// [`last_year`] relative to an explicit reference date.
#[must_use]
pub fn last_year_from(today: NaiveDate) -> DateWindow {
    DateWindow {
        start: first_of_year(today.year() - 1),
        end: first_of_year(today.year()) - Duration::days(1),
    }
}

/// The current quarter so far.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] if the window is entirely in
/// the future (only possible on the first day of a quarter).
pub fn current_quarter() -> Result<DateWindow, DateRangeError> {
    quarter_from(0, crate::today().year(), crate::today())
}

/// The previous full quarter.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] if the bounds are invalid.
pub fn last_quarter() -> Result<DateWindow, DateRangeError> {
    quarter_from(-1, crate::today().year(), crate::today())
}

/// An arbitrary quarter of a year.
///
/// `q` is 1 through 4 for a specific quarter, `0` for the current quarter
/// (ending yesterday), or `-1` for the previous quarter.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] if `q` is out of range or the
/// window lies entirely in the future.
pub fn quarter(q: i8, year: i32) -> Result<DateWindow, DateRangeError> {
    quarter_from(q, year, crate::today())
}

/// [`quarter`] relative to an explicit reference date.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] if `q` is out of range or the
/// window lies entirely in the future.
pub fn quarter_from(q: i8, year: i32, today: NaiveDate) -> Result<DateWindow, DateRangeError> {
    let current = quarter_of(today);

    let (number, year) = match q {
        0 => {
            let bounds = quarter_bounds(current, today.year());
            return Ok(DateWindow {
                start: bounds.start,
                end: today - Duration::days(1),
            });
        }
        -1 if current == 1 => (4, today.year() - 1),
        -1 => (current - 1, today.year()),
        1..=4 => (u32::try_from(q).unwrap_or(1), year),
        _ => {
            return Err(DateRangeError::InvalidRange {
                message: format!("quarter number must be -1, 0, or 1 through 4, got {q}"),
            });
        }
    };

    clamp_to_yesterday(
        quarter_bounds(number, year),
        today,
        &format!("Q{number} of {year}"),
    )
}

/// An arbitrary ISO week of a year.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] if the week number is out of
/// range or the window lies entirely in the future.
pub fn week(number: u32, year: i32, first_day: Weekday) -> Result<DateWindow, DateRangeError> {
    week_range(number, number, year, first_day)
}

/// An inclusive range of ISO weeks of a year.
///
/// `first_day` shifts the week boundary; Monday is the conventional
/// default.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] if the week numbers are out of
/// range or the window lies entirely in the future.
pub fn week_range(
    from: u32,
    to: u32,
    year: i32,
    first_day: Weekday,
) -> Result<DateWindow, DateRangeError> {
    week_range_from(from, to, year, first_day, crate::today())
}

/// [`week_range`] relative to an explicit reference date.
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] if the week numbers are out of
/// range or the window lies entirely in the future.
pub fn week_range_from(
    from: u32,
    to: u32,
    year: i32,
    first_day: Weekday,
    today: NaiveDate,
) -> Result<DateWindow, DateRangeError> {
    if from == 0 || to > 53 || from > to {
        return Err(DateRangeError::InvalidRange {
            message: format!("week range {from}..={to} is not a valid span of weeks 1 through 53"),
        });
    }

    let jan_first = first_of_year(year);
    let mut start = jan_first + Duration::weeks(i64::from(from))
        - Duration::days(i64::from(jan_first.weekday().num_days_from_monday()));
    start = start + Duration::days(first_day_offset(first_day));
    let end = start + Duration::weeks(i64::from(to - from)) + Duration::days(6);

    clamp_to_yesterday(
        DateWindow { start, end },
        today,
        &format!("week {to} of {year}"),
    )
}

/// Collapses several windows into one spanning window (earliest start,
/// latest end).
///
/// # Errors
///
/// Returns [`DateRangeError::InvalidRange`] when given no windows.
pub fn combine(ranges: &[DateWindow]) -> Result<DateWindow, DateRangeError> {
    let start = ranges.iter().map(|r| r.start).min();
    let end = ranges.iter().map(|r| r.end).max();
    match (start, end) {
        (Some(start), Some(end)) => Ok(DateWindow { start, end }),
        _ => Err(DateRangeError::InvalidRange {
            message: "cannot combine an empty set of date ranges".to_owned(),
        }),
    }
}

/// Rejects fully-future windows and clamps partially-future ones to
/// yesterday, warning about the adjustment.
fn clamp_to_yesterday(
    window: DateWindow,
    today: NaiveDate,
    label: &str,
) -> Result<DateWindow, DateRangeError> {
    if window.start > today {
        return Err(DateRangeError::InvalidRange {
            message: format!("{label} lies in the future and cannot yield any results"),
        });
    }
    if window.end > today {
        log::warn!("{label} is partially in the future; the end date is set to yesterday");
        return Ok(DateWindow {
            start: window.start,
            end: today - Duration::days(1),
        });
    }
    Ok(window)
}

fn quarter_of(date: NaiveDate) -> u32 {
    (date.month0() / 3) + 1
}

fn quarter_bounds(number: u32, year: i32) -> DateWindow {
    let start_month = (number - 1) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(year, start_month, 1)
        .unwrap_or_else(|| first_of_year(year));
    let end = if number == 4 {
        first_of_year(year + 1) - Duration::days(1)
    } else {
        NaiveDate::from_ymd_opt(year, start_month + 3, 1)
            .unwrap_or_else(|| first_of_year(year + 1))
            - Duration::days(1)
    };
    DateWindow { start, end }
}

fn first_of_year(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1st always exists")
}

const fn first_day_offset(first_day: Weekday) -> i64 {
    match first_day {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => -3,
        Weekday::Sat => -2,
        Weekday::Sun => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn yesterday_is_a_single_day() {
        let window = yesterday_from(date(2024, 3, 10));
        assert_eq!(window.start, date(2024, 3, 9));
        assert_eq!(window.end, date(2024, 3, 9));
    }

    #[test]
    fn last_week_is_the_previous_monday_through_sunday() {
        // 2024-03-13 is a Wednesday.
        let window = last_week_from(date(2024, 3, 13));
        assert_eq!(window.start, date(2024, 3, 4));
        assert_eq!(window.end, date(2024, 3, 10));
    }

    #[test]
    fn last_n_days_ends_yesterday() {
        let window = last_n_days_from(7, date(2024, 3, 10));
        assert_eq!(window.end, date(2024, 3, 9));
        assert_eq!(window.len_days(), 7);
    }

    #[test]
    fn last_month_spans_the_previous_calendar_month() {
        let window = last_month_from(date(2024, 3, 10));
        assert_eq!(window.start, date(2024, 2, 1));
        assert_eq!(window.end, date(2024, 2, 29));
    }

    #[test]
    fn last_month_wraps_the_year_boundary() {
        let window = last_month_from(date(2024, 1, 15));
        assert_eq!(window.start, date(2023, 12, 1));
        assert_eq!(window.end, date(2023, 12, 31));
    }

    #[test]
    fn last_year_is_the_full_previous_year() {
        let window = last_year_from(date(2024, 3, 10));
        assert_eq!(window.start, date(2023, 1, 1));
        assert_eq!(window.end, date(2023, 12, 31));
    }

    #[test]
    fn specific_quarter_in_the_past() {
        let window = quarter_from(2, 2023, date(2024, 3, 10)).unwrap();
        assert_eq!(window.start, date(2023, 4, 1));
        assert_eq!(window.end, date(2023, 6, 30));
    }

    #[test]
    fn fourth_quarter_ends_december_31st() {
        let window = quarter_from(4, 2023, date(2024, 3, 10)).unwrap();
        assert_eq!(window.start, date(2023, 10, 1));
        assert_eq!(window.end, date(2023, 12, 31));
    }

    #[test]
    fn current_quarter_ends_yesterday() {
        let window = quarter_from(0, 2024, date(2024, 5, 20)).unwrap();
        assert_eq!(window.start, date(2024, 4, 1));
        assert_eq!(window.end, date(2024, 5, 19));
    }

    #[test]
    fn previous_quarter_wraps_the_year_boundary() {
        let window = quarter_from(-1, 2024, date(2024, 2, 10)).unwrap();
        assert_eq!(window.start, date(2023, 10, 1));
        assert_eq!(window.end, date(2023, 12, 31));
    }

    #[test]
    fn running_quarter_is_clamped_to_yesterday() {
        let window = quarter_from(2, 2024, date(2024, 5, 20)).unwrap();
        assert_eq!(window.start, date(2024, 4, 1));
        assert_eq!(window.end, date(2024, 5, 19));
    }

    #[test]
    fn future_quarter_is_rejected() {
        assert!(matches!(
            quarter_from(4, 2024, date(2024, 5, 20)),
            Err(DateRangeError::InvalidRange { .. })
        ));
    }

    #[test]
    fn quarter_number_out_of_range_is_rejected() {
        assert!(quarter_from(5, 2024, date(2024, 5, 20)).is_err());
        assert!(quarter_from(-2, 2024, date(2024, 5, 20)).is_err());
    }

    #[test]
    fn week_spans_seven_days() {
        let window = week_range_from(10, 10, 2024, Weekday::Mon, date(2024, 12, 1)).unwrap();
        assert_eq!(window.len_days(), 7);
        assert_eq!(window.start.weekday(), Weekday::Mon);
    }

    #[test]
    fn week_range_spans_whole_weeks() {
        let window = week_range_from(10, 12, 2024, Weekday::Mon, date(2024, 12, 1)).unwrap();
        assert_eq!(window.len_days(), 21);
    }

    #[test]
    fn week_with_sunday_start_shifts_back_one_day() {
        let monday = week_range_from(10, 10, 2024, Weekday::Mon, date(2024, 12, 1)).unwrap();
        let sunday = week_range_from(10, 10, 2024, Weekday::Sun, date(2024, 12, 1)).unwrap();
        assert_eq!(sunday.start, monday.start - Duration::days(1));
    }

    #[test]
    fn future_week_is_rejected() {
        assert!(week_range_from(40, 41, 2024, Weekday::Mon, date(2024, 3, 1)).is_err());
    }

    #[test]
    fn partially_future_week_is_clamped() {
        // Week 9 of 2024 starts Monday 2024-03-04.
        let window = week_range_from(9, 9, 2024, Weekday::Mon, date(2024, 3, 6)).unwrap();
        assert_eq!(window.end, date(2024, 3, 5));
    }

    #[test]
    fn invalid_week_span_is_rejected() {
        assert!(week_range_from(0, 3, 2024, Weekday::Mon, date(2024, 3, 6)).is_err());
        assert!(week_range_from(5, 3, 2024, Weekday::Mon, date(2024, 3, 6)).is_err());
    }

    #[test]
    fn combine_spans_all_inputs() {
        let combined = combine(&[
            DateWindow {
                start: date(2024, 1, 5),
                end: date(2024, 1, 10),
            },
            DateWindow {
                start: date(2023, 12, 1),
                end: date(2023, 12, 20),
            },
        ])
        .unwrap();
        assert_eq!(combined.start, date(2023, 12, 1));
        assert_eq!(combined.end, date(2024, 1, 10));
    }

    #[test]
    fn combine_rejects_empty_input() {
        assert!(combine(&[]).is_err());
    }
}
