//! Per-person reconciliation pipeline.
//!
//! Drives one snapshot against the registry, one person at a time:
//! upsert the person, diff each source record in order, apply the
//! resulting mutations, then re-derive primary classification from
//! the post-diff engagement set. Fault isolation is per person — a
//! failure is logged with enough context for manual correction and
//! the batch continues with the next person.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use orgsync_core::PersonKey;

use crate::config::SyncConfig;
use crate::diff::{Action, DiffEngine};
use crate::error::SyncResult;
use crate::primary::PrimarySelector;
use crate::registry::{EngagementPatch, RegistryReader, RegistryWriter, WriteOutcome};
use crate::source::{PersonSnapshot, SourceRecord};

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Persons fully reconciled.
    pub persons_processed: u64,
    /// Persons abandoned after a failure.
    pub persons_failed: u64,
    /// Persons created in the registry.
    pub persons_created: u64,
    /// Persons whose display name was updated.
    pub persons_renamed: u64,
    /// Engagements created.
    pub engagements_created: u64,
    /// Engagements edited (structural fields or validity).
    pub engagements_edited: u64,
    /// Engagements terminated.
    pub engagements_terminated: u64,
    /// Classification rewrites emitted by the primary selector.
    pub classification_edits: u64,
    /// Records already consistent with the registry.
    pub noops: u64,
    /// Records skipped with a warning (unhandled status, filtered
    /// unit).
    pub warnings: u64,
}

impl RunStatistics {
    /// Total mutations written to the registry.
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.persons_created
            + self.persons_renamed
            + self.engagements_created
            + self.engagements_edited
            + self.engagements_terminated
            + self.classification_edits
    }
}

/// One person the run could not reconcile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonFailure {
    /// Correlation key of the abandoned person.
    pub person: PersonKey,
    /// What went wrong.
    pub error: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Counters.
    pub statistics: RunStatistics,
    /// Per-person failures, in input order.
    pub failures: Vec<PersonFailure>,
}

impl RunReport {
    /// Whether every person reconciled cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sequential reconciliation driver.
pub struct SyncPipeline<R> {
    registry: R,
    diff: DiffEngine,
    selector: PrimarySelector,
    config: SyncConfig,
}

impl<R> SyncPipeline<R>
where
    R: RegistryReader + RegistryWriter,
{
    /// Create a pipeline with default configuration.
    pub fn new(registry: R) -> Self {
        Self::with_config(registry, SyncConfig::default())
    }

    /// Create a pipeline with explicit configuration.
    pub fn with_config(registry: R, config: SyncConfig) -> Self {
        Self {
            registry,
            diff: DiffEngine::new(),
            selector: PrimarySelector::new(),
            config,
        }
    }

    /// Borrow the registry collaborator.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Reconcile one snapshot against the registry.
    pub async fn run(&self, snapshot: &[PersonSnapshot]) -> RunReport {
        let started_at = Utc::now();
        let effective_date = self.config.resolve_effective_date();
        info!(
            persons = snapshot.len(),
            effective_date = %effective_date,
            "Starting reconciliation run"
        );

        let mut statistics = RunStatistics::default();
        let mut failures = Vec::new();

        for person in snapshot {
            match self.process_person(person, &mut statistics).await {
                Ok(()) => statistics.persons_processed += 1,
                Err(err) => {
                    error!(
                        person = %person.key,
                        error = %err,
                        "Abandoning person after failure"
                    );
                    statistics.persons_failed += 1;
                    failures.push(PersonFailure {
                        person: person.key.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let report = RunReport {
            started_at,
            completed_at: Utc::now(),
            statistics,
            failures,
        };
        info!(
            processed = statistics.persons_processed,
            failed = statistics.persons_failed,
            mutations = statistics.mutations(),
            "Reconciliation run finished"
        );
        report
    }

    async fn process_person(
        &self,
        person: &PersonSnapshot,
        statistics: &mut RunStatistics,
    ) -> SyncResult<()> {
        self.upsert_person(person, statistics).await?;

        let effective_date = self.config.resolve_effective_date();
        for record in &person.records {
            if let Some(unit) = record.org_unit {
                if self.config.is_filtered(&unit) {
                    warn!(
                        person = %person.key,
                        engagement = %record.employment_id,
                        unit = %unit,
                        "Engagement is to a filtered unit, skipping"
                    );
                    statistics.warnings += 1;
                    continue;
                }
            }

            let current = self
                .registry
                .find_engagement(&person.key, &record.employment_id)
                .await?;
            let actions =
                self.diff
                    .reconcile(&person.key, record, current.as_ref(), effective_date)?;
            if record.status.is_unhandled() {
                // Counted as a warning, not as a no-op; the diff
                // engine already logged the gap.
                statistics.warnings += 1;
                continue;
            }
            for action in actions {
                self.apply(&person.key, record, action, statistics).await?;
            }
        }

        self.reclassify(&person.key, statistics).await
    }

    async fn upsert_person(
        &self,
        person: &PersonSnapshot,
        statistics: &mut RunStatistics,
    ) -> SyncResult<()> {
        match self.registry.find_person(&person.key).await? {
            None => {
                info!(person = %person.key, "Creating person");
                self.registry.create_person(&person.key, &person.name).await?;
                statistics.persons_created += 1;
            }
            Some(existing) if existing.name != person.name => {
                info!(person = %person.key, "Updating person name");
                self.registry.update_person(&person.key, &person.name).await?;
                statistics.persons_renamed += 1;
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn apply(
        &self,
        person: &PersonKey,
        record: &SourceRecord,
        action: Action,
        statistics: &mut RunStatistics,
    ) -> SyncResult<()> {
        match action {
            Action::NoOp => statistics.noops += 1,
            Action::Create { fields, validity } => {
                self.registry
                    .create_engagement(person, &fields, validity)
                    .await?;
                statistics.engagements_created += 1;
            }
            Action::Edit { changes, validity } => {
                match self
                    .registry
                    .edit_engagement(&record.employment_id, &changes, validity)
                    .await?
                {
                    WriteOutcome::Applied => statistics.engagements_edited += 1,
                    WriteOutcome::NoNewRegistration => statistics.noops += 1,
                }
            }
            Action::Terminate { end_date } => {
                match self
                    .registry
                    .terminate_engagement(&record.employment_id, end_date)
                    .await?
                {
                    WriteOutcome::Applied => statistics.engagements_terminated += 1,
                    WriteOutcome::NoNewRegistration => statistics.noops += 1,
                }
            }
        }
        Ok(())
    }

    /// Re-derive primary classification from the post-diff engagement
    /// set and write back what changed.
    async fn reclassify(
        &self,
        person: &PersonKey,
        statistics: &mut RunStatistics,
    ) -> SyncResult<()> {
        let engagements = self.registry.engagements_for_person(person).await?;
        let edits = self.selector.recalculate(person, &engagements)?;
        for edit in edits {
            let changes = EngagementPatch {
                kind: Some(edit.kind),
                ..Default::default()
            };
            if self
                .registry
                .edit_engagement(&edit.employment_id, &changes, edit.validity)
                .await?
                == WriteOutcome::Applied
            {
                statistics.classification_edits += 1;
            }
        }
        Ok(())
    }
}
