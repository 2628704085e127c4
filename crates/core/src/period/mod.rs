//! Report periods: the current window and its PAM / PAA baselines.
//!
//! PAM is the full calendar month immediately before the month of the current
//! window's start. PAA is the same calendar month one year earlier.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::reports::ReportError;

#[cfg(test)]
mod tests;

/// Logical role of a period within one report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodTag {
    /// The window the caller asked for.
    Current,
    /// Previous month.
    Pam,
    /// Same month, previous year.
    Paa,
}

impl std::fmt::Display for PeriodTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Current => "current",
            Self::Pam => "pam",
            Self::Paa => "paa",
        })
    }
}

/// An inclusive date range with its logical tag. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReportPeriod {
    /// Role of this period.
    pub tag: PeriodTag,
    /// First day, inclusive.
    #[serde(rename = "inicio")]
    pub start: NaiveDate,
    /// Last day, inclusive.
    #[serde(rename = "fim")]
    pub end: NaiveDate,
}

impl ReportPeriod {
    /// Creates a period.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidDateRange` if `start > end`.
    pub fn new(tag: PeriodTag, start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidDateRange { start, end });
        }
        Ok(Self { tag, start, end })
    }

    /// Full calendar month containing `date`.
    #[must_use]
    pub fn month_of(tag: PeriodTag, date: NaiveDate) -> Self {
        let (start, end) = month_bounds(date);
        Self { tag, start, end }
    }

    /// Number of days covered, counting both ends.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// The current window plus both comparison baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodSet {
    /// Requested window.
    pub current: ReportPeriod,
    /// Previous month.
    pub pam: ReportPeriod,
    /// Same month, previous year.
    pub paa: ReportPeriod,
}

impl PeriodSet {
    /// Derives PAM and PAA from the current window.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidDateRange` if `start > end`.
    pub fn derive(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        let current = ReportPeriod::new(PeriodTag::Current, start, end)?;
        Ok(Self {
            current,
            pam: ReportPeriod::month_of(PeriodTag::Pam, previous_month(start)),
            paa: ReportPeriod::month_of(PeriodTag::Paa, same_month_previous_year(start)),
        })
    }

    /// The baselines, in a stable order.
    #[must_use]
    pub const fn baselines(&self) -> [ReportPeriod; 2] {
        [self.pam, self.paa]
    }
}

/// First and last day of the month containing `date`.
#[must_use]
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    (first, last)
}

/// First day of the month before the one containing `date`.
#[must_use]
pub fn previous_month(date: NaiveDate) -> NaiveDate {
    let first = month_bounds(date).0;
    first.checked_sub_months(Months::new(1)).unwrap_or(first)
}

/// First day of the same month one year before `date`.
#[must_use]
pub fn same_month_previous_year(date: NaiveDate) -> NaiveDate {
    let first = month_bounds(date).0;
    first.checked_sub_months(Months::new(12)).unwrap_or(first)
}
