//! Validity intervals.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time range during which a registry fact is considered true.
///
/// `from` is the first valid day and `to` the last; `to = None` means
/// the fact is open-ended. The source feed reports inclusive end
/// dates, with `9999-12-31` standing in for "no end" — normalization
/// maps that to `None` before an interval is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityInterval {
    /// First day the fact holds.
    pub from: NaiveDate,
    /// Last day the fact holds, or `None` when open-ended.
    pub to: Option<NaiveDate>,
}

impl ValidityInterval {
    /// Build an interval, requiring `from <= to` when `to` is set.
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self, InvalidInterval> {
        if let Some(to) = to {
            if from > to {
                return Err(InvalidInterval { from, to });
            }
        }
        Ok(Self { from, to })
    }

    /// Open-ended interval starting at `from`.
    #[must_use]
    pub fn open(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    /// Whether `date` falls inside the interval.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && self.to.is_none_or(|to| date <= to)
    }

    /// Whether two intervals share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: &ValidityInterval) -> bool {
        let starts_before_other_ends = other.to.is_none_or(|to| self.from <= to);
        let other_starts_before_end = self.to.is_none_or(|to| other.from <= to);
        starts_before_other_ends && other_starts_before_end
    }

    /// First day after the interval, or `None` when open-ended.
    ///
    /// This is the breakpoint the validity partitioner uses: the day
    /// a successor fact would take over.
    #[must_use]
    pub fn end_exclusive(&self) -> Option<NaiveDate> {
        self.to.and_then(|to| to.checked_add_days(Days::new(1)))
    }

    /// Whether the interval has no end date.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }
}

impl fmt::Display for ValidityInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) => write!(f, "[{} .. {}]", self.from, to),
            None => write!(f, "[{} ..)", self.from),
        }
    }
}

/// Error for an interval whose end precedes its start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInterval {
    /// Offending start date.
    pub from: NaiveDate,
    /// Offending end date.
    pub to: NaiveDate,
}

impl fmt::Display for InvalidInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interval ends ({}) before it starts ({})", self.to, self.from)
    }
}

impl std::error::Error for InvalidInterval {}
