//! Calendar arithmetic with overflow normalization.
//!
//! Step-up schedules and fiscal-quarter anchors are computed by adding whole
//! years and months to a date. Out-of-range day and month values roll over
//! into the following month or year instead of clamping, so January 31 plus
//! one month is March 3 (or March 2 in a leap year), and "December 32" is
//! January 1 of the next year.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Build a date from possibly out-of-range month and day components.
///
/// Months outside `1..=12` carry into the year, days outside the month carry
/// into neighbouring months. Returns `None` only when the result falls
/// outside chrono's supported range.
///
/// # Examples
///
/// ```
/// use subledger_core::calendar::normalized_date;
/// use chrono::NaiveDate;
///
/// assert_eq!(
///     normalized_date(2024, 12, 32),
///     NaiveDate::from_ymd_opt(2025, 1, 1)
/// );
/// assert_eq!(
///     normalized_date(2024, 0, 1),
///     NaiveDate::from_ymd_opt(2023, 12, 1)
/// );
/// ```
#[must_use]
pub fn normalized_date(year: i32, month: i32, day: i32) -> Option<NaiveDate> {
    let total_months = i64::from(year) * 12 + i64::from(month) - 1;
    let y = i32::try_from(total_months.div_euclid(12)).ok()?;
    let m = total_months.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(y, m, 1)?;
    first.checked_add_signed(Duration::days(i64::from(day) - 1))
}

/// Add years, months and days to a date, normalizing overflow.
#[must_use]
pub fn add_date(date: NaiveDate, years: i32, months: i32, days: i32) -> Option<NaiveDate> {
    normalized_date(
        date.year() + years,
        date.month() as i32 + months,
        date.day() as i32 + days,
    )
}

/// Add years, months and days to a timestamp, keeping its time of day.
#[must_use]
pub fn add_date_time(
    timestamp: DateTime<Utc>,
    years: i32,
    months: i32,
    days: i32,
) -> Option<DateTime<Utc>> {
    let date = add_date(timestamp.date_naive(), years, months, days)?;
    Some(date.and_time(timestamp.time()).and_utc())
}

/// Number of days in the given month.
#[must_use]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.map_or(31, |n| (n - first).num_days() as u32)
}

/// Calendar difference between two instants, decomposed with borrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalendarDiff {
    /// Whole years.
    pub years: i32,
    /// Remaining whole months (0..=11).
    pub months: i32,
    /// Remaining days.
    pub days: i32,
    /// Remaining hours.
    pub hours: i32,
    /// Remaining minutes.
    pub minutes: i32,
    /// Remaining seconds.
    pub seconds: i32,
}

/// Compute the calendar difference between two instants.
///
/// The arguments are ordered internally, so the result is always
/// non-negative. Each component is the plain field difference; negative
/// components borrow from the next larger unit, with a day borrow adding the
/// length of the earlier instant's month.
///
/// # Examples
///
/// ```
/// use subledger_core::calendar::date_diff;
/// use chrono::NaiveDate;
///
/// let a = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let b = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let diff = date_diff(a, b);
/// assert_eq!((diff.years, diff.months, diff.days), (1, 1, 1));
/// ```
#[must_use]
pub fn date_diff(a: NaiveDateTime, b: NaiveDateTime) -> CalendarDiff {
    let (a, b) = if a > b { (b, a) } else { (a, b) };

    let mut diff = CalendarDiff {
        years: b.year() - a.year(),
        months: b.month() as i32 - a.month() as i32,
        days: b.day() as i32 - a.day() as i32,
        hours: b.hour() as i32 - a.hour() as i32,
        minutes: b.minute() as i32 - a.minute() as i32,
        seconds: b.second() as i32 - a.second() as i32,
    };

    if diff.seconds < 0 {
        diff.seconds += 60;
        diff.minutes -= 1;
    }
    if diff.minutes < 0 {
        diff.minutes += 60;
        diff.hours -= 1;
    }
    if diff.hours < 0 {
        diff.hours += 24;
        diff.days -= 1;
    }
    if diff.days < 0 {
        diff.days += days_in_month(a.year(), a.month()) as i32;
        diff.months -= 1;
    }
    if diff.months < 0 {
        diff.months += 12;
        diff.years -= 1;
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_month_overflow_rolls_forward() {
        assert_eq!(add_date(date(2023, 1, 31), 0, 1, 0), Some(date(2023, 3, 3)));
        assert_eq!(add_date(date(2024, 1, 31), 0, 1, 0), Some(date(2024, 3, 2)));
    }

    #[test]
    fn test_negative_months_roll_back() {
        assert_eq!(add_date(date(2024, 2, 1), 0, -3, 0), Some(date(2023, 11, 1)));
        assert_eq!(normalized_date(2024, -13, 5), Some(date(2022, 11, 5)));
    }

    #[test]
    fn test_leap_day_plus_years() {
        assert_eq!(add_date(date(2020, 2, 29), 5, 0, 0), Some(date(2025, 3, 1)));
        assert_eq!(add_date(date(2020, 2, 29), 4, 0, 0), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_add_date_time_keeps_clock() {
        let ts = Utc.with_ymd_and_hms(2019, 6, 15, 13, 45, 0).unwrap();
        let shifted = add_date_time(ts, 5, 0, 0).unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2024, 6, 15, 13, 45, 0).unwrap());
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 4), 30);
    }

    #[test]
    fn test_date_diff_is_symmetric() {
        let a = date(2021, 4, 1).and_hms_opt(0, 0, 0).unwrap();
        let b = date(2023, 6, 15).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(date_diff(a, b), date_diff(b, a));
        let diff = date_diff(a, b);
        assert_eq!((diff.years, diff.months, diff.days), (2, 2, 14));
    }

    #[test]
    fn test_date_diff_borrows_days_from_earlier_month() {
        let a = date(2024, 1, 20).and_hms_opt(0, 0, 0).unwrap();
        let b = date(2024, 3, 5).and_hms_opt(0, 0, 0).unwrap();
        let diff = date_diff(a, b);
        // 5 - 20 = -15, borrow January's 31 days
        assert_eq!((diff.years, diff.months, diff.days), (0, 1, 16));
    }

    #[test]
    fn test_date_diff_borrows_hours() {
        let a = date(2024, 1, 1).and_hms_opt(18, 0, 0).unwrap();
        let b = date(2024, 1, 2).and_hms_opt(6, 0, 0).unwrap();
        let diff = date_diff(a, b);
        assert_eq!((diff.days, diff.hours), (0, 12));
    }
}
