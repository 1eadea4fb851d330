//! Validity partitioner.
//!
//! Turns the full set of validity intervals for one person's
//! engagements into a covering sequence of non-overlapping
//! sub-intervals. Within each sub-interval the set of concurrently
//! active engagements is constant, so the primary selector can
//! classify each sub-interval independently — over the person's whole
//! timeline, not merely "now".

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use orgsync_core::ValidityInterval;

/// Partition `intervals` into ordered, non-overlapping sub-intervals.
///
/// Breakpoints are every interval start plus the first day after
/// every finite interval end; the last finite breakpoint opens an
/// unbounded sentinel sub-interval. Stretches no input interval
/// covers are dropped, so the union of the output exactly equals the
/// union of the input.
#[must_use]
pub fn partition(intervals: &[ValidityInterval]) -> Vec<ValidityInterval> {
    let mut breakpoints: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut any_open = false;
    for interval in intervals {
        breakpoints.insert(interval.from);
        match interval.end_exclusive() {
            Some(end) => {
                breakpoints.insert(end);
            }
            None => any_open = true,
        }
    }

    let breakpoints: Vec<NaiveDate> = breakpoints.into_iter().collect();
    let mut parts = Vec::new();

    for pair in breakpoints.windows(2) {
        let from = pair[0];
        // The next breakpoint is exclusive; the sub-interval runs
        // through the day before it.
        let to = pair[1].checked_sub_days(Days::new(1));
        let part = ValidityInterval { from, to };
        if covered(intervals, from) {
            parts.push(part);
        }
    }

    // Sentinel: the open-ended future after the last finite
    // breakpoint. Only survives when some input reaches it.
    if let Some(&last) = breakpoints.last() {
        if any_open && covered(intervals, last) {
            parts.push(ValidityInterval::open(last));
        }
    }

    parts
}

fn covered(intervals: &[ValidityInterval], date: NaiveDate) -> bool {
    intervals.iter().any(|iv| iv.contains(date))
}
