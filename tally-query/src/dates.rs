//! Relative date windows.
//!
//! Every function takes the reference instant explicitly; nothing here reads
//! the clock. All calendar math is UTC.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tally_core::{FilterOp, TallyError, TallyResult, Timestamp, ValidationError};

/// A concrete time range produced from a relative operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    /// `last_n_days` includes `end`; calendar periods exclude it.
    pub end_inclusive: bool,
}

impl DateWindow {
    pub fn contains(&self, instant: Timestamp) -> bool {
        instant >= self.start
            && (instant < self.end || (self.end_inclusive && instant == self.end))
    }
}

/// Symbolic time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeWindow {
    ThisWeek,
    ThisMonth,
    ThisQuarter,
    LastNDays(i64),
}

impl RelativeWindow {
    /// The window named by a filter operator, if it names one.
    pub fn from_op(op: &FilterOp) -> Option<Self> {
        match op {
            FilterOp::ThisWeek => Some(Self::ThisWeek),
            FilterOp::ThisMonth => Some(Self::ThisMonth),
            FilterOp::ThisQuarter => Some(Self::ThisQuarter),
            FilterOp::LastNDays(days) => Some(Self::LastNDays(i64::from(*days))),
            _ => None,
        }
    }

    /// Resolve against `now`. `field` only names the offender in errors.
    pub fn resolve(&self, field: &str, now: Timestamp) -> TallyResult<DateWindow> {
        let window = match self {
            Self::ThisWeek => this_week(now),
            Self::ThisMonth => this_month(now),
            Self::ThisQuarter => this_quarter(now),
            Self::LastNDays(days) => {
                if *days <= 0 {
                    return Err(ValidationError::invalid_value(
                        field,
                        "last_n_days",
                        format!("day count must be a positive integer, got {days}"),
                    )
                    .into());
                }
                return last_n_days(*days, now).ok_or_else(|| {
                    ValidationError::invalid_value(field, "last_n_days", "day count out of range")
                        .into()
                });
            }
        };
        window.ok_or_else(|| TallyError::internal(format!("date window out of range at {now}")))
    }
}

fn midnight(date: NaiveDate) -> Timestamp {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn period(start: NaiveDate, end: NaiveDate) -> DateWindow {
    DateWindow {
        start: midnight(start),
        end: midnight(end),
        end_inclusive: false,
    }
}

/// Monday 00:00 of the current ISO week through the following Monday.
pub fn this_week(now: Timestamp) -> Option<DateWindow> {
    let today = now.date_naive();
    let back = u64::from(today.weekday().num_days_from_monday());
    let start = today.checked_sub_days(Days::new(back))?;
    let end = start.checked_add_days(Days::new(7))?;
    Some(period(start, end))
}

/// First day of the current month through the first day of the next.
pub fn this_month(now: Timestamp) -> Option<DateWindow> {
    let start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
    let end = start.checked_add_months(Months::new(1))?;
    Some(period(start, end))
}

/// First day of the current calendar quarter (Jan/Apr/Jul/Oct) through the next.
pub fn this_quarter(now: Timestamp) -> Option<DateWindow> {
    let first_month = (now.month0() / 3) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(now.year(), first_month, 1)?;
    let end = start.checked_add_months(Months::new(3))?;
    Some(period(start, end))
}

/// `[now - days, now]`, both ends inclusive. Callers validate `days > 0`.
pub fn last_n_days(days: i64, now: Timestamp) -> Option<DateWindow> {
    let start = now.checked_sub_signed(TimeDelta::try_days(days)?)?;
    Some(DateWindow {
        start,
        end: now,
        end_inclusive: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tally_core::ErrorKind;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_this_week_starts_monday() {
        // Sunday
        let now = at(2026, 10, 18, 15, 30);
        let window = this_week(now).unwrap();
        assert_eq!(window.start, at(2026, 10, 12, 0, 0));
        assert_eq!(window.end, at(2026, 10, 19, 0, 0));
        assert!(!window.end_inclusive);
        assert!(window.contains(now));
        assert!(!window.contains(window.end));
    }

    #[test]
    fn test_this_week_on_monday_midnight() {
        let now = at(2026, 10, 12, 0, 0);
        let window = this_week(now).unwrap();
        assert_eq!(window.start, now);
    }

    #[test]
    fn test_this_week_crosses_year() {
        let window = this_week(at(2026, 1, 1, 9, 0)).unwrap();
        assert_eq!(window.start, at(2025, 12, 29, 0, 0));
        assert_eq!(window.end, at(2026, 1, 5, 0, 0));
    }

    #[test]
    fn test_this_month_december_rolls_year() {
        let window = this_month(at(2026, 12, 31, 23, 59)).unwrap();
        assert_eq!(window.start, at(2026, 12, 1, 0, 0));
        assert_eq!(window.end, at(2027, 1, 1, 0, 0));
    }

    #[test]
    fn test_this_quarter_boundaries() {
        let q4 = this_quarter(at(2026, 10, 18, 12, 0)).unwrap();
        assert_eq!(q4.start, at(2026, 10, 1, 0, 0));
        assert_eq!(q4.end, at(2027, 1, 1, 0, 0));

        let q1 = this_quarter(at(2026, 3, 31, 23, 0)).unwrap();
        assert_eq!(q1.start, at(2026, 1, 1, 0, 0));
        assert_eq!(q1.end, at(2026, 4, 1, 0, 0));

        let q2 = this_quarter(at(2026, 4, 1, 0, 0)).unwrap();
        assert_eq!(q2.start, at(2026, 4, 1, 0, 0));
        assert_eq!(q2.end, at(2026, 7, 1, 0, 0));
    }

    #[test]
    fn test_last_n_days_is_inclusive() {
        let now = at(2026, 10, 18, 15, 30);
        let window = RelativeWindow::LastNDays(7).resolve("created_at", now).unwrap();
        assert_eq!(window.start, at(2026, 10, 11, 15, 30));
        assert_eq!(window.end, now);
        assert!(window.contains(window.start));
        assert!(window.contains(now));
        assert!(!window.contains(now + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_last_n_days_rejects_non_positive() {
        let now = at(2026, 10, 18, 15, 30);
        for days in [0, -1, -30] {
            let err = RelativeWindow::LastNDays(days)
                .resolve("created_at", now)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidValue);
            assert!(err.to_string().contains("created_at"));
        }
    }

    #[test]
    fn test_from_op() {
        assert_eq!(
            RelativeWindow::from_op(&FilterOp::LastNDays(3)),
            Some(RelativeWindow::LastNDays(3))
        );
        assert_eq!(RelativeWindow::from_op(&FilterOp::IsNull), None);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Two instants in the same calendar month resolve to the same window.
        #[test]
        fn prop_this_month_idempotent_within_month(
            year in 1990i32..2100,
            month in 1u32..=12,
            d1 in 1u32..=28,
            d2 in 1u32..=28,
            s1 in 0u32..86_400,
            s2 in 0u32..86_400,
        ) {
            let a = Utc.with_ymd_and_hms(year, month, d1, s1 / 3600, (s1 / 60) % 60, s1 % 60).unwrap();
            let b = Utc.with_ymd_and_hms(year, month, d2, s2 / 3600, (s2 / 60) % 60, s2 % 60).unwrap();
            prop_assert_eq!(this_month(a), this_month(b));
        }

        /// Every calendar window contains the instant it was resolved from.
        #[test]
        fn prop_calendar_windows_contain_now(secs in 0i64..4_102_444_800) {
            let now = Utc.timestamp_opt(secs, 0).unwrap();
            for window in [this_week(now), this_month(now), this_quarter(now)] {
                let window = window.unwrap();
                prop_assert!(window.contains(now));
                prop_assert!(window.start <= now && now < window.end);
            }
        }

        /// this_week always starts on a Monday at midnight and spans seven days.
        #[test]
        fn prop_this_week_spans_seven_days(secs in 0i64..4_102_444_800) {
            let now = Utc.timestamp_opt(secs, 0).unwrap();
            let window = this_week(now).unwrap();
            prop_assert_eq!(window.start.weekday(), chrono::Weekday::Mon);
            prop_assert_eq!(window.end - window.start, TimeDelta::days(7));
        }
    }
}
