//! Calendar helpers: reference months and month arithmetic

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{FynnessError, FynnessResult};

/// A reference month (year + month), e.g. an invoice's billing month
///
/// Internally anchored on the first day of the month so every accessor is
/// infallible once the value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PeriodRepr", into = "PeriodRepr")]
pub struct Period {
    first: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PeriodRepr {
    year: i32,
    month: u32,
}

impl TryFrom<PeriodRepr> for Period {
    type Error = FynnessError;

    fn try_from(repr: PeriodRepr) -> Result<Self, Self::Error> {
        Period::new(repr.year, repr.month)
    }
}

impl From<Period> for PeriodRepr {
    fn from(period: Period) -> Self {
        PeriodRepr {
            year: period.year(),
            month: period.month(),
        }
    }
}

impl Period {
    /// Build a period, rejecting months outside 1..=12 and absurd years
    pub fn new(year: i32, month: u32) -> FynnessResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(FynnessError::field(
                "month",
                format!("must be between 1 and 12 (got {})", month),
            ));
        }
        if !(1900..=9999).contains(&year) {
            return Err(FynnessError::field(
                "year",
                format!("must be between 1900 and 9999 (got {})", year),
            ));
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| Period { first })
            .ok_or_else(|| FynnessError::field("month", "invalid calendar month"))
    }

    /// The period a date falls into
    pub fn of(date: NaiveDate) -> Self {
        Period {
            first: date - Days::new(u64::from(date.day0())),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first + Months::new(1) - Days::new(1)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    /// Whether `date` falls within [first, last] day of the month
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day() && date <= self.last_day()
    }

    pub fn next(&self) -> Self {
        Period {
            first: self.first + Months::new(1),
        }
    }

    /// The given day of this month, clamped to the month's last day
    pub fn day_clamped(&self, day: u32) -> NaiveDate {
        let day = day.clamp(1, self.days_in_month());
        self.first + Days::new(u64::from(day - 1))
    }

    /// A month is closed once its last day is behind `today`
    pub fn is_closed(&self, today: NaiveDate) -> bool {
        self.last_day() < today
    }

    /// A month has started once its first day is not after `today`
    pub fn has_started(&self, today: NaiveDate) -> bool {
        self.first <= today
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// Advance `date` by `months` calendar months, clamping the day-of-month
///
/// Jan 31 + 1 month lands on Feb 28 (or 29); the result is always computed
/// from the original date, never chained.
pub fn add_months(date: NaiveDate, months: u32) -> FynnessResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| FynnessError::field("first_due_date", "date out of range"))
}
