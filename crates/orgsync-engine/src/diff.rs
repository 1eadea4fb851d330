//! The diff engine: one source record against one registry record.
//!
//! `reconcile` is pure — no I/O, no hidden state. It decides what the
//! registry writer should do for a single upstream-reported fact, and
//! the pipeline applies the resulting actions in order.

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use orgsync_core::{Engagement, EngagementKind, PersonKey, ValidityInterval};

use crate::error::{SyncError, SyncResult};
use crate::registry::{EngagementFields, EngagementPatch};
use crate::source::SourceRecord;

/// A registry mutation the diff engine has decided on.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Source and registry agree; write nothing.
    NoOp,
    /// The engagement is unseen in the registry.
    Create {
        /// Full field set from the source.
        fields: EngagementFields,
        /// Validity starting at the source's own activation date.
        validity: ValidityInterval,
    },
    /// One or more tracked fields (or the end date) changed.
    Edit {
        /// Only the fields that differ.
        changes: EngagementPatch,
        /// From the run's effective date to the source end date.
        validity: ValidityInterval,
    },
    /// The engagement ends.
    Terminate {
        /// Last day of employment.
        end_date: NaiveDate,
    },
}

/// Tolerance for occupancy-rate comparison; the feed reports at most
/// six decimal places.
const RATE_EPSILON: f64 = 1e-9;

fn rate_differs(a: f64, b: f64) -> bool {
    (a - b).abs() > RATE_EPSILON
}

/// Stateless decision engine for one (source, current) pair.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Create a diff engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decide the mutations that converge `current` to `source`.
    ///
    /// Rules, in order: an unhandled status (not yet started, leave)
    /// warns and does nothing; an ended status forces termination; an
    /// active status creates the engagement when unseen, otherwise
    /// compares tracked fields and emits an edit carrying only the
    /// changes, plus a trailing termination when the source shortened
    /// the end date. Extensions are applied only via the edit, never
    /// silently.
    pub fn reconcile(
        &self,
        person: &PersonKey,
        source: &SourceRecord,
        current: Option<&Engagement>,
        effective_date: NaiveDate,
    ) -> SyncResult<Vec<Action>> {
        if source.status.is_unhandled() {
            // Documented gap: the original feed is inconsistent about
            // statuses 0 and 3, so no business rule is inferred here.
            warn!(
                person = %person,
                engagement = %source.employment_id,
                status = %source.status,
                "Unhandled employment status, no mutation"
            );
            return Ok(vec![Action::NoOp]);
        }

        if source.status.is_ended() {
            return Ok(self.reconcile_ended(person, source, current));
        }

        // Active status from here on; the status enum is exhaustive
        // and unknown codes were rejected at the ingestion boundary.
        if let Some(rate) = source.occupancy_rate {
            if !rate_differs(rate, 0.0) {
                return Ok(self.reconcile_zero_rate(person, source, current, effective_date));
            }
        }

        match current {
            None => Ok(vec![self.create(person, source)?]),
            Some(current) => Ok(self.edit(person, source, current, effective_date)),
        }
    }

    fn reconcile_ended(
        &self,
        person: &PersonKey,
        source: &SourceRecord,
        current: Option<&Engagement>,
    ) -> Vec<Action> {
        match current {
            Some(current) => {
                // The ended status activates the day after the last
                // day of employment.
                let end_date = source
                    .validity
                    .from
                    .checked_sub_days(Days::new(1))
                    .unwrap_or(source.validity.from);
                if current.validity.to == Some(end_date) {
                    debug!(
                        person = %person,
                        engagement = %source.employment_id,
                        end_date = %end_date,
                        "Employment end already recorded"
                    );
                    return vec![Action::NoOp];
                }
                info!(
                    person = %person,
                    engagement = %source.employment_id,
                    status = %source.status,
                    end_date = %end_date,
                    "Source reports end of employment"
                );
                vec![Action::Terminate { end_date }]
            }
            None => {
                // Never actually hired; nothing to terminate.
                info!(
                    person = %person,
                    engagement = %source.employment_id,
                    status = %source.status,
                    "Ended engagement unknown to registry, nothing to do"
                );
                vec![Action::NoOp]
            }
        }
    }

    fn reconcile_zero_rate(
        &self,
        person: &PersonKey,
        source: &SourceRecord,
        current: Option<&Engagement>,
        effective_date: NaiveDate,
    ) -> Vec<Action> {
        match current {
            Some(current) => {
                // An engagement that already ended needs no further
                // termination; re-terminating at the run date would
                // move the recorded end on every run.
                if current.validity.to.is_some_and(|to| to <= effective_date) {
                    debug!(
                        person = %person,
                        engagement = %source.employment_id,
                        "Zero-rate engagement already ended"
                    );
                    return vec![Action::NoOp];
                }
                info!(
                    person = %person,
                    engagement = %source.employment_id,
                    "Occupancy rate reported as zero, terminating"
                );
                vec![Action::Terminate {
                    end_date: effective_date,
                }]
            }
            None => {
                warn!(
                    person = %person,
                    engagement = %source.employment_id,
                    "Occupancy rate zero for unseen engagement, skipping"
                );
                vec![Action::NoOp]
            }
        }
    }

    fn create(&self, person: &PersonKey, source: &SourceRecord) -> SyncResult<Action> {
        let org_unit = source.org_unit.ok_or_else(|| SyncError::InvalidRecord {
            engagement: source.employment_id.clone(),
            message: "create requires an org unit reference".to_string(),
        })?;
        let job_function = source
            .job_function
            .clone()
            .ok_or_else(|| SyncError::InvalidRecord {
                engagement: source.employment_id.clone(),
                message: "create requires a job function".to_string(),
            })?;

        info!(
            person = %person,
            engagement = %source.employment_id,
            validity = %source.validity,
            "Creating engagement"
        );
        Ok(Action::Create {
            fields: EngagementFields {
                employment_id: source.employment_id.clone(),
                org_unit,
                job_function,
                // Classification is derived, never taken from the
                // source; the primary selector rewrites it.
                kind: EngagementKind::NonPrimary,
                occupancy_rate: source.occupancy_rate,
            },
            validity: source.validity,
        })
    }

    fn edit(
        &self,
        person: &PersonKey,
        source: &SourceRecord,
        current: &Engagement,
        effective_date: NaiveDate,
    ) -> Vec<Action> {
        let mut changes = EngagementPatch::default();

        if let Some(org_unit) = source.org_unit {
            if org_unit != current.org_unit {
                changes.org_unit = Some(org_unit);
            }
        }
        if let Some(job_function) = &source.job_function {
            if *job_function != current.job_function {
                changes.job_function = Some(job_function.clone());
            }
        }
        if let Some(rate) = source.occupancy_rate {
            if rate_differs(rate, current.effective_rate()) {
                changes.occupancy_rate = Some(rate);
            }
        }

        let end_changed = source.validity.to != current.validity.to;
        if changes.is_empty() && !end_changed {
            debug!(
                person = %person,
                engagement = %source.employment_id,
                "No tracked differences"
            );
            return vec![Action::NoOp];
        }

        // The edit window starts at the run's effective date, not the
        // original hire date; history before the run stays untouched.
        // Clamped to the source end date so a run executing after the
        // engagement ended still produces a well-formed window.
        let from = source
            .validity
            .to
            .map_or(effective_date, |to| effective_date.min(to));
        let validity = ValidityInterval {
            from,
            to: source.validity.to,
        };
        info!(
            person = %person,
            engagement = %source.employment_id,
            changes = ?changes,
            validity = %validity,
            "Editing engagement"
        );
        let mut actions = vec![Action::Edit { changes, validity }];

        // A shortened end date (including closing an open interval)
        // also terminates the tail. Extensions were already carried
        // by the edit above.
        let shortened = match (source.validity.to, current.validity.to) {
            (Some(new_end), Some(old_end)) => new_end < old_end,
            (Some(_), None) => true,
            _ => false,
        };
        if shortened {
            if let Some(end_date) = source.validity.to {
                info!(
                    person = %person,
                    engagement = %source.employment_id,
                    end_date = %end_date,
                    "Source shortened validity, terminating tail"
                );
                actions.push(Action::Terminate { end_date });
            }
        }

        actions
    }
}
