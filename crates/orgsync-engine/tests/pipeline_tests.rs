//! End-to-end pipeline tests against an in-memory registry.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use orgsync_core::{
    Classification, EmploymentId, Engagement, EngagementKind, EmploymentStatus, OrgUnitId,
    Person, PersonKey, ValidityInterval,
};
use orgsync_engine::registry::{EngagementFields, EngagementPatch};
use orgsync_engine::{
    PersonSnapshot, RegistryReader, RegistryWriter, SourceRecord, SyncConfig, SyncError,
    SyncPipeline, SyncResult, WriteOutcome,
};

#[derive(Default)]
struct State {
    persons: HashMap<PersonKey, Person>,
    engagements: HashMap<PersonKey, Vec<Engagement>>,
}

/// Registry fake backed by hash maps. Edits and terminations mutate
/// in place; the documented "no new registration" response is returned
/// when an edit changes nothing.
#[derive(Default)]
struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    fn new() -> Self {
        Self::default()
    }

    fn insert_engagement(&self, person: &PersonKey, engagement: Engagement) {
        let mut state = self.state.lock().unwrap();
        state
            .engagements
            .entry(person.clone())
            .or_default()
            .push(engagement);
    }

    fn insert_person(&self, person: Person) {
        let mut state = self.state.lock().unwrap();
        state.persons.insert(person.key.clone(), person);
    }

    fn person(&self, key: &PersonKey) -> Option<Person> {
        self.state.lock().unwrap().persons.get(key).cloned()
    }

    fn engagements(&self, key: &PersonKey) -> Vec<Engagement> {
        self.state
            .lock()
            .unwrap()
            .engagements
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RegistryReader for InMemoryRegistry {
    async fn find_person(&self, key: &PersonKey) -> SyncResult<Option<Person>> {
        Ok(self.person(key))
    }

    async fn find_engagement(
        &self,
        person: &PersonKey,
        id: &EmploymentId,
    ) -> SyncResult<Option<Engagement>> {
        let matches: Vec<Engagement> = self
            .engagements(person)
            .into_iter()
            .filter(|e| e.employment_id == *id)
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.into_iter().next()),
            n => Err(SyncError::AmbiguousEngagement {
                engagement: id.clone(),
                matches: n,
            }),
        }
    }

    async fn engagements_for_person(&self, person: &PersonKey) -> SyncResult<Vec<Engagement>> {
        Ok(self.engagements(person))
    }
}

#[async_trait]
impl RegistryWriter for InMemoryRegistry {
    async fn create_person(&self, key: &PersonKey, name: &str) -> SyncResult<Uuid> {
        let uuid = Uuid::new_v4();
        self.insert_person(Person {
            uuid,
            key: key.clone(),
            name: name.to_string(),
        });
        Ok(uuid)
    }

    async fn update_person(&self, key: &PersonKey, name: &str) -> SyncResult<WriteOutcome> {
        let mut state = self.state.lock().unwrap();
        let person = state
            .persons
            .get_mut(key)
            .ok_or_else(|| SyncError::Registry {
                operation: "update_person".to_string(),
                engagement: EmploymentId::new(""),
                message: format!("unknown person {key}"),
            })?;
        if person.name == name {
            return Ok(WriteOutcome::NoNewRegistration);
        }
        person.name = name.to_string();
        Ok(WriteOutcome::Applied)
    }

    async fn create_engagement(
        &self,
        person: &PersonKey,
        fields: &EngagementFields,
        validity: ValidityInterval,
    ) -> SyncResult<Uuid> {
        let uuid = Uuid::new_v4();
        self.insert_engagement(
            person,
            Engagement {
                uuid,
                employment_id: fields.employment_id.clone(),
                org_unit: fields.org_unit,
                job_function: fields.job_function.clone(),
                classifications: vec![Classification {
                    kind: fields.kind,
                    validity,
                }],
                occupancy_rate: fields.occupancy_rate,
                validity,
            },
        );
        Ok(uuid)
    }

    async fn edit_engagement(
        &self,
        id: &EmploymentId,
        changes: &EngagementPatch,
        validity: ValidityInterval,
    ) -> SyncResult<WriteOutcome> {
        let mut state = self.state.lock().unwrap();
        let engagement = state
            .engagements
            .values_mut()
            .flatten()
            .find(|e| e.employment_id == *id)
            .ok_or_else(|| SyncError::Registry {
                operation: "edit_engagement".to_string(),
                engagement: id.clone(),
                message: "no such engagement".to_string(),
            })?;

        let mut changed = false;
        if let Some(unit) = changes.org_unit {
            if engagement.org_unit != unit {
                engagement.org_unit = unit;
                changed = true;
            }
        }
        if let Some(job_function) = &changes.job_function {
            if engagement.job_function != *job_function {
                engagement.job_function = job_function.clone();
                changed = true;
            }
        }
        if let Some(rate) = changes.occupancy_rate {
            if engagement.occupancy_rate != Some(rate) {
                engagement.occupancy_rate = Some(rate);
                changed = true;
            }
        }
        if let Some(kind) = changes.kind {
            if engagement.kind_at(validity.from) != kind {
                engagement.set_classification(kind, validity);
                changed = true;
            }
        }
        // A classification rewrite is scoped to a sub-interval of the
        // engagement's lifetime and must not move its end date.
        let classification_only = changes.kind.is_some()
            && changes.org_unit.is_none()
            && changes.job_function.is_none()
            && changes.occupancy_rate.is_none();
        if !classification_only && engagement.validity.to != validity.to {
            engagement.validity.to = validity.to;
            changed = true;
        }

        if changed {
            Ok(WriteOutcome::Applied)
        } else {
            Ok(WriteOutcome::NoNewRegistration)
        }
    }

    async fn terminate_engagement(
        &self,
        id: &EmploymentId,
        end_date: NaiveDate,
    ) -> SyncResult<WriteOutcome> {
        let mut state = self.state.lock().unwrap();
        let engagement = state
            .engagements
            .values_mut()
            .flatten()
            .find(|e| e.employment_id == *id)
            .ok_or_else(|| SyncError::Registry {
                operation: "terminate_engagement".to_string(),
                engagement: id.clone(),
                message: "no such engagement".to_string(),
            })?;
        if engagement.validity.to == Some(end_date) {
            return Ok(WriteOutcome::NoNewRegistration);
        }
        engagement.validity.to = Some(end_date);
        Ok(WriteOutcome::Applied)
    }
}

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn unit_a() -> OrgUnitId {
    OrgUnitId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap()
}

fn unit_b() -> OrgUnitId {
    OrgUnitId::parse("550e8400-e29b-41d4-a716-446655440001").unwrap()
}

fn key() -> PersonKey {
    PersonKey::new("0101701234")
}

fn record(id: &str, rate: f64) -> SourceRecord {
    SourceRecord {
        employment_id: EmploymentId::new(id),
        status: EmploymentStatus::Active,
        org_unit: Some(unit_a()),
        job_function: Some("Teacher".to_string()),
        occupancy_rate: Some(rate),
        validity: ValidityInterval {
            from: d("2020-01-01"),
            to: None,
        },
    }
}

fn seeded_engagement(unit: OrgUnitId) -> Engagement {
    let validity = ValidityInterval {
        from: d("2020-01-01"),
        to: None,
    };
    Engagement {
        uuid: Uuid::new_v4(),
        employment_id: EmploymentId::new("12345"),
        org_unit: unit,
        job_function: "Teacher".to_string(),
        classifications: vec![Classification {
            kind: EngagementKind::Primary,
            validity,
        }],
        occupancy_rate: Some(0.8),
        validity,
    }
}

fn snapshot(records: Vec<SourceRecord>) -> Vec<PersonSnapshot> {
    vec![PersonSnapshot {
        key: key(),
        name: "Anna Andersen".to_string(),
        records,
    }]
}

fn pipeline_at(
    registry: InMemoryRegistry,
    effective_date: &str,
) -> SyncPipeline<InMemoryRegistry> {
    SyncPipeline::with_config(
        registry,
        SyncConfig {
            effective_date: Some(d(effective_date)),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_new_person_becomes_primary_engagement() {
    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    let report = pipeline.run(&snapshot(vec![record("12345", 0.8)])).await;

    assert!(report.is_clean());
    assert_eq!(report.statistics.persons_created, 1);
    assert_eq!(report.statistics.engagements_created, 1);
    // A person's only engagement is always promoted.
    assert_eq!(report.statistics.classification_edits, 1);

    let engagements = pipeline.registry().engagements(&key());
    assert_eq!(engagements.len(), 1);
    assert_eq!(
        engagements[0].kind_at(d("2021-01-15")),
        EngagementKind::Primary
    );
    assert_eq!(engagements[0].org_unit, unit_a());
}

#[tokio::test]
async fn test_second_run_writes_nothing() {
    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    let snapshot = snapshot(vec![record("12345", 0.8)]);

    let first = pipeline.run(&snapshot).await;
    assert!(first.statistics.mutations() > 0);

    let second = pipeline.run(&snapshot).await;
    assert!(second.is_clean());
    assert_eq!(second.statistics.mutations(), 0);
    assert_eq!(second.statistics.persons_processed, 1);
    assert!(second.statistics.noops >= 1);
}

#[tokio::test]
async fn test_highest_rate_wins_primary() {
    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    let report = pipeline
        .run(&snapshot(vec![record("1", 0.6), record("2", 0.8)]))
        .await;

    assert!(report.is_clean());
    let engagements = pipeline.registry().engagements(&key());
    let primaries: Vec<&Engagement> = engagements
        .iter()
        .filter(|e| e.kind_at(d("2021-01-15")) == EngagementKind::Primary)
        .collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].employment_id, EmploymentId::new("2"));
}

#[tokio::test]
async fn test_equal_rates_tie_break_on_lowest_id() {
    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    // Input order reversed on purpose; the outcome must not depend
    // on arrangement.
    let report = pipeline
        .run(&snapshot(vec![record("10", 0.5), record("2", 0.5)]))
        .await;

    assert!(report.is_clean());
    let engagements = pipeline.registry().engagements(&key());
    for engagement in &engagements {
        let expected = if engagement.employment_id == EmploymentId::new("2") {
            EngagementKind::Primary
        } else {
            EngagementKind::NonPrimary
        };
        assert_eq!(
            engagement.kind_at(d("2021-01-15")),
            expected,
            "{}",
            engagement.employment_id
        );
    }
}

#[tokio::test]
async fn test_department_move_is_edited_in_place() {
    let registry = InMemoryRegistry::new();
    registry.insert_person(Person {
        uuid: Uuid::new_v4(),
        key: key(),
        name: "Anna Andersen".to_string(),
    });
    registry.insert_engagement(&key(), seeded_engagement(unit_b()));

    let pipeline = pipeline_at(registry, "2021-01-15");
    let report = pipeline.run(&snapshot(vec![record("12345", 0.8)])).await;

    assert!(report.is_clean());
    assert_eq!(report.statistics.engagements_created, 0);
    assert_eq!(report.statistics.engagements_edited, 1);
    let engagements = pipeline.registry().engagements(&key());
    assert_eq!(engagements[0].org_unit, unit_a());
    assert_eq!(
        engagements[0].kind_at(d("2021-01-15")),
        EngagementKind::Primary
    );
}

#[tokio::test]
async fn test_ended_status_terminates_registry_engagement() {
    let registry = InMemoryRegistry::new();
    registry.insert_person(Person {
        uuid: Uuid::new_v4(),
        key: key(),
        name: "Anna Andersen".to_string(),
    });
    registry.insert_engagement(&key(), seeded_engagement(unit_a()));

    let mut ended = record("12345", 0.8);
    ended.status = EmploymentStatus::Ended;
    ended.validity.from = d("2021-03-02");

    let pipeline = pipeline_at(registry, "2021-01-15");
    let report = pipeline.run(&snapshot(vec![ended.clone()])).await;

    assert!(report.is_clean());
    assert_eq!(report.statistics.engagements_terminated, 1);
    let engagements = pipeline.registry().engagements(&key());
    assert_eq!(engagements[0].validity.to, Some(d("2021-03-01")));

    // Re-running against the already-terminated engagement writes
    // nothing and does not count another termination.
    let second = pipeline.run(&snapshot(vec![ended])).await;
    assert!(second.is_clean());
    assert_eq!(second.statistics.engagements_terminated, 0);
    assert_eq!(second.statistics.mutations(), 0);
}

#[tokio::test]
async fn test_filtered_unit_is_skipped_with_warning() {
    let registry = InMemoryRegistry::new();
    let pipeline = SyncPipeline::with_config(
        registry,
        SyncConfig {
            effective_date: Some(d("2021-01-15")),
            filter_unit_ids: vec![unit_a()],
        },
    );
    let report = pipeline.run(&snapshot(vec![record("12345", 0.8)])).await;

    assert!(report.is_clean());
    assert_eq!(report.statistics.engagements_created, 0);
    assert_eq!(report.statistics.warnings, 1);
    // The person is still upserted; only the engagement is withheld.
    assert_eq!(report.statistics.persons_created, 1);
    assert!(pipeline.registry().engagements(&key()).is_empty());
}

#[tokio::test]
async fn test_person_failure_does_not_abort_run() {
    let mut broken = record("111", 0.8);
    broken.org_unit = None; // create without a unit is rejected
    let bad = PersonSnapshot {
        key: PersonKey::new("0101701234"),
        name: "Anna Andersen".to_string(),
        records: vec![broken],
    };
    let good = PersonSnapshot {
        key: PersonKey::new("0202801234"),
        name: "Bent Bentsen".to_string(),
        records: vec![record("222", 0.5)],
    };

    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    let report = pipeline.run(&[bad, good]).await;

    assert_eq!(report.statistics.persons_failed, 1);
    assert_eq!(report.statistics.persons_processed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].person, PersonKey::new("0101701234"));
    assert_eq!(
        pipeline
            .registry()
            .engagements(&PersonKey::new("0202801234"))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_name_change_updates_person() {
    let registry = InMemoryRegistry::new();
    registry.insert_person(Person {
        uuid: Uuid::new_v4(),
        key: key(),
        name: "Anna Jensen".to_string(),
    });

    let pipeline = pipeline_at(registry, "2021-01-15");
    let report = pipeline.run(&snapshot(vec![record("12345", 0.8)])).await;

    assert!(report.is_clean());
    assert_eq!(report.statistics.persons_renamed, 1);
    assert_eq!(
        pipeline.registry().person(&key()).unwrap().name,
        "Anna Andersen"
    );
}

#[tokio::test]
async fn test_primary_shifts_when_rates_change() {
    // First run: "1" wins on rate. Second run: "2" now reports the
    // higher rate and takes over, demoting "1".
    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    pipeline
        .run(&snapshot(vec![record("1", 0.8), record("2", 0.4)]))
        .await;

    let report = pipeline
        .run(&snapshot(vec![record("1", 0.3), record("2", 0.9)]))
        .await;
    assert!(report.is_clean());

    let engagements = pipeline.registry().engagements(&key());
    for engagement in &engagements {
        let expected = if engagement.employment_id == EmploymentId::new("2") {
            EngagementKind::Primary
        } else {
            EngagementKind::NonPrimary
        };
        assert_eq!(
            engagement.kind_at(d("2021-01-15")),
            expected,
            "{}",
            engagement.employment_id
        );
    }
}

#[tokio::test]
async fn test_disjoint_engagements_each_primary_in_own_window() {
    let mut early = record("1", 0.5);
    early.validity = ValidityInterval {
        from: d("2020-01-01"),
        to: Some(d("2020-06-30")),
    };
    let mut late = record("2", 0.5);
    late.validity = ValidityInterval {
        from: d("2020-07-01"),
        to: None,
    };

    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    let report = pipeline.run(&snapshot(vec![early, late])).await;

    assert!(report.is_clean());
    let engagements = pipeline.registry().engagements(&key());
    assert_eq!(engagements.len(), 2);
    // Non-overlapping windows: each is the sole active engagement in
    // its own sub-interval, so both end up primary there.
    for engagement in &engagements {
        assert_eq!(
            engagement.kind_at(engagement.validity.from),
            EngagementKind::Primary,
            "{}",
            engagement.employment_id
        );
    }
}

#[tokio::test]
async fn test_overlapping_windows_keep_single_primary_per_instant() {
    // An open engagement overlapped mid-lifetime by a higher-rate
    // closed one: the overlap demotes the open engagement only for
    // that stretch, and the state the run writes must satisfy its own
    // derivation on the next run.
    let open = record("100", 0.5);
    let mut burst = record("200", 0.9);
    burst.validity = ValidityInterval {
        from: d("2020-06-01"),
        to: Some(d("2020-12-31")),
    };

    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    let report = pipeline.run(&snapshot(vec![open, burst])).await;
    assert!(report.is_clean());

    let engagements = pipeline.registry().engagements(&key());
    for day in ["2020-03-01", "2020-08-01", "2021-02-01"] {
        let day = d(day);
        let primaries: Vec<&EmploymentId> = engagements
            .iter()
            .filter(|e| e.validity.contains(day) && e.kind_at(day) == EngagementKind::Primary)
            .map(|e| &e.employment_id)
            .collect();
        assert_eq!(primaries.len(), 1, "day {day}: {primaries:?}");
    }
    let at_overlap = engagements
        .iter()
        .find(|e| e.kind_at(d("2020-08-01")) == EngagementKind::Primary)
        .unwrap();
    assert_eq!(at_overlap.employment_id, EmploymentId::new("200"));

    // Second run converges: no mutations, no inconsistency.
    let open = record("100", 0.5);
    let mut burst = record("200", 0.9);
    burst.validity = ValidityInterval {
        from: d("2020-06-01"),
        to: Some(d("2020-12-31")),
    };
    let second = pipeline.run(&snapshot(vec![open, burst])).await;
    assert!(second.is_clean());
    assert_eq!(second.statistics.mutations(), 0);
}

#[tokio::test]
async fn test_unhandled_status_counts_warning_only() {
    let mut leave = record("12345", 0.8);
    leave.status = EmploymentStatus::Leave;

    let pipeline = pipeline_at(InMemoryRegistry::new(), "2021-01-15");
    let report = pipeline.run(&snapshot(vec![leave])).await;

    assert!(report.is_clean());
    assert_eq!(report.statistics.warnings, 1);
    // The record lands in exactly one bucket.
    assert_eq!(report.statistics.noops, 0);
    assert_eq!(report.statistics.engagements_created, 0);
}
