//! Primary engagement selection.
//!
//! Exactly one of a person's concurrently active engagements is
//! "primary" at any instant — the one authoritative for reporting and
//! authorization. The selector re-derives the classification over the
//! person's whole partitioned timeline after structural
//! reconciliation and emits edits only where the registry's recorded
//! classification differs.

use tracing::{debug, info};

use orgsync_core::{EmploymentId, Engagement, EngagementKind, PersonKey, ValidityInterval};

use crate::error::{SyncError, SyncResult};
use crate::partition::partition;

/// Tolerance for occupancy-rate ties.
const RATE_EPSILON: f64 = 1e-9;

/// A classification rewrite for one engagement over one sub-interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationEdit {
    /// Engagement to rewrite.
    pub employment_id: EmploymentId,
    /// Newly derived classification.
    pub kind: EngagementKind,
    /// The sub-interval the classification holds for.
    pub validity: ValidityInterval,
}

/// Derives primary/non-primary classification per sub-interval.
#[derive(Debug, Clone, Default)]
pub struct PrimarySelector;

impl PrimarySelector {
    /// Create a selector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Recompute classification for one person's post-diff engagement
    /// set.
    ///
    /// Per sub-interval: the active engagement with the highest
    /// occupancy rate wins (a missing rate counts as zero); ties
    /// break to the smallest employment id, independent of input
    /// order. Finding two engagements already marked primary for the
    /// same instant is a consistency error, never resolved by
    /// picking one arbitrarily.
    pub fn recalculate(
        &self,
        person: &PersonKey,
        engagements: &[Engagement],
    ) -> SyncResult<Vec<ClassificationEdit>> {
        let intervals: Vec<ValidityInterval> =
            engagements.iter().map(|e| e.validity).collect();
        let mut edits = Vec::new();

        for sub in partition(&intervals) {
            let active: Vec<&Engagement> = engagements
                .iter()
                .filter(|e| e.validity.contains(sub.from))
                .collect();
            if active.is_empty() {
                continue;
            }

            let marked_primary: Vec<EmploymentId> = active
                .iter()
                .filter(|e| e.kind_at(sub.from) == EngagementKind::Primary)
                .map(|e| e.employment_id.clone())
                .collect();
            if marked_primary.len() > 1 {
                return Err(SyncError::InconsistentPrimary {
                    person: person.clone(),
                    date: sub.from,
                    engagements: marked_primary,
                });
            }

            let selected = select_primary(&active);
            debug!(
                person = %person,
                sub_interval = %sub,
                primary = %selected,
                active = active.len(),
                "Derived primary engagement"
            );

            for engagement in &active {
                let kind = if engagement.employment_id == *selected {
                    EngagementKind::Primary
                } else {
                    EngagementKind::NonPrimary
                };
                // Idempotence: unchanged classifications produce no
                // write.
                if engagement.kind_at(sub.from) != kind {
                    info!(
                        person = %person,
                        engagement = %engagement.employment_id,
                        kind = %kind,
                        validity = %sub,
                        "Reclassifying engagement"
                    );
                    edits.push(ClassificationEdit {
                        employment_id: engagement.employment_id.clone(),
                        kind,
                        validity: sub,
                    });
                }
            }
        }

        Ok(edits)
    }
}

/// Pick the primary among a non-empty active set: highest effective
/// rate, smallest id on ties.
fn select_primary<'a>(active: &[&'a Engagement]) -> &'a EmploymentId {
    let max_rate = active
        .iter()
        .map(|e| e.effective_rate())
        .fold(f64::NEG_INFINITY, f64::max);

    let winner = active
        .iter()
        .filter(|e| (e.effective_rate() - max_rate).abs() <= RATE_EPSILON)
        .min_by(|a, b| a.employment_id.cmp(&b.employment_id));

    match winner {
        Some(engagement) => &engagement.employment_id,
        // The max rate came from `active`, so the candidate set is
        // non-empty whenever `active` is.
        None => unreachable!("candidate set empty for non-empty active set"),
    }
}
