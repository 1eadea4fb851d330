//! Source-record ingestion and normalization.
//!
//! Vendor payloads sometimes represent a repeated field as a single
//! object and sometimes as a list, and they interleave several kinds
//! of change events (status, department, profession, working time)
//! under one employment object. Everything is normalized here, at the
//! boundary, into a uniform ordered sequence of [`SourceRecord`]s —
//! no scalar-or-list value ever reaches the diff engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orgsync_core::{EmploymentId, EmploymentStatus, OrgUnitId, PersonKey, ValidityInterval};

use crate::error::{SyncError, SyncResult};

/// Sentinel the feed uses for "no end date".
const OPEN_END: &str = "9999-12-31";

/// A field that is sometimes a single object, sometimes a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// Scalar form.
    One(T),
    /// List form.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flatten into an ordered vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

fn events<T>(field: Option<OneOrMany<T>>) -> Vec<T> {
    field.map(OneOrMany::into_vec).unwrap_or_default()
}

/// One upstream-reported fact about an engagement.
///
/// A record either carries the full field set (a status event, e.g. a
/// hire or a termination) or a single changed aspect with its own
/// validity window (a department move, a title change, a working-time
/// change). Field-change events carry [`EmploymentStatus::Active`]:
/// the feed only reports them for engagements it considers active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Business key of the engagement.
    pub employment_id: EmploymentId,
    /// Status driving the diff dispatch.
    pub status: EmploymentStatus,
    /// Unit reference, when this event carries one.
    pub org_unit: Option<OrgUnitId>,
    /// Job-function text, when this event carries one.
    pub job_function: Option<String>,
    /// Occupancy rate, when this event carries one.
    pub occupancy_rate: Option<f64>,
    /// When the reported fact holds.
    pub validity: ValidityInterval,
}

/// Normalized snapshot input for one person: the correlation key, the
/// display name, and the ordered source records for all engagements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSnapshot {
    /// Stable correlation key.
    pub key: PersonKey,
    /// Display name as reported by the source.
    pub name: String,
    /// Ordered change events, one per independent field change.
    pub records: Vec<SourceRecord>,
}

/// Raw status event as the vendor reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStatus {
    /// Vendor status code (`0`, `1`, `3`, `8`, `9`, `S`).
    pub code: String,
    /// First day the status holds.
    pub activation_date: String,
    /// Last day the status holds.
    pub deactivation_date: String,
}

/// Raw department assignment event.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDepartment {
    /// Unit identifier.
    pub org_unit: String,
    /// First day of the assignment.
    pub activation_date: String,
    /// Last day of the assignment.
    pub deactivation_date: String,
}

/// Raw profession (job function) event.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProfession {
    /// Job-function text.
    pub name: String,
    /// First day the title holds.
    pub activation_date: String,
    /// Last day the title holds.
    pub deactivation_date: String,
}

/// Raw working-time event.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkingTime {
    /// Fraction of a full position.
    pub occupation_rate: f64,
    /// First day the rate holds.
    pub activation_date: String,
    /// Last day the rate holds.
    pub deactivation_date: String,
}

/// One vendor employment object, scalar-or-list fields and all.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEmployment {
    /// Business key of the engagement.
    pub employment_id: String,
    /// Status events, if any.
    #[serde(default)]
    pub status: Option<OneOrMany<RawStatus>>,
    /// Department events, if any.
    #[serde(default)]
    pub department: Option<OneOrMany<RawDepartment>>,
    /// Profession events, if any.
    #[serde(default)]
    pub profession: Option<OneOrMany<RawProfession>>,
    /// Working-time events, if any.
    #[serde(default)]
    pub working_time: Option<OneOrMany<RawWorkingTime>>,
}

/// One vendor person object: name fields plus employment objects.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPersonSnapshot {
    /// Stable correlation key.
    pub key: String,
    /// Given name.
    pub given_name: String,
    /// Surname.
    pub surname: String,
    /// Employment objects, scalar or list.
    #[serde(default)]
    pub employment: Option<OneOrMany<RawEmployment>>,
}

impl RawPersonSnapshot {
    /// Normalize into the engine's per-person input.
    ///
    /// A malformed employment object (unknown status code, bad date,
    /// rate outside range) is a hard error for that record only: it
    /// is logged with full context and skipped, and the person's
    /// remaining records go through.
    pub fn normalize(self) -> PersonSnapshot {
        let key = PersonKey::new(self.key);
        let name = format!("{} {}", self.given_name, self.surname);
        let mut records = Vec::new();
        for employment in events(self.employment) {
            match employment.normalize(&key) {
                Ok(normalized) => records.extend(normalized),
                Err(error) => {
                    tracing::error!(person = %key, %error, "Rejecting source record");
                }
            }
        }
        PersonSnapshot { key, name, records }
    }
}

impl RawEmployment {
    /// Flatten this employment object into ordered source records.
    ///
    /// Status events come first. An active status event absorbs the
    /// first department, profession and working-time event so that a
    /// hire arrives as one complete record; every further event of
    /// each kind becomes its own record with its own validity window.
    /// Two separate department moves therefore yield two records and,
    /// downstream, two discrete validity-stamped edits.
    pub fn normalize(self, person: &PersonKey) -> SyncResult<Vec<SourceRecord>> {
        let id = EmploymentId::new(self.employment_id);

        let statuses = events(self.status);
        let mut departments = events(self.department).into_iter();
        let mut professions = events(self.profession).into_iter();
        let mut working_times = events(self.working_time).into_iter();

        let mut records = Vec::new();
        let mut saw_active_status = false;

        for status in statuses {
            let parsed = EmploymentStatus::from_code(&status.code).map_err(|e| {
                SyncError::UnknownStatusCode {
                    code: e.code,
                    person: person.clone(),
                    engagement: id.clone(),
                }
            })?;
            let validity = parse_validity(&id, &status.activation_date, &status.deactivation_date)?;

            if parsed.is_active() && !saw_active_status {
                saw_active_status = true;
                let department = departments.next();
                let profession = professions.next();
                let working_time = working_times.next();
                records.push(SourceRecord {
                    employment_id: id.clone(),
                    status: parsed,
                    org_unit: department
                        .map(|d| parse_org_unit(&id, &d.org_unit))
                        .transpose()?,
                    job_function: profession.map(|p| p.name),
                    occupancy_rate: working_time
                        .map(|w| validate_rate(&id, w.occupation_rate))
                        .transpose()?,
                    validity,
                });
            } else {
                records.push(SourceRecord {
                    employment_id: id.clone(),
                    status: parsed,
                    org_unit: None,
                    job_function: None,
                    occupancy_rate: None,
                    validity,
                });
            }
        }

        for department in departments {
            let validity =
                parse_validity(&id, &department.activation_date, &department.deactivation_date)?;
            records.push(SourceRecord {
                employment_id: id.clone(),
                status: EmploymentStatus::Active,
                org_unit: Some(parse_org_unit(&id, &department.org_unit)?),
                job_function: None,
                occupancy_rate: None,
                validity,
            });
        }

        for profession in professions {
            let validity =
                parse_validity(&id, &profession.activation_date, &profession.deactivation_date)?;
            records.push(SourceRecord {
                employment_id: id.clone(),
                status: EmploymentStatus::Active,
                org_unit: None,
                job_function: Some(profession.name),
                occupancy_rate: None,
                validity,
            });
        }

        for working_time in working_times {
            let validity = parse_validity(
                &id,
                &working_time.activation_date,
                &working_time.deactivation_date,
            )?;
            records.push(SourceRecord {
                employment_id: id.clone(),
                status: EmploymentStatus::Active,
                org_unit: None,
                job_function: None,
                occupancy_rate: Some(validate_rate(&id, working_time.occupation_rate)?),
                validity,
            });
        }

        Ok(records)
    }
}

fn parse_date(id: &EmploymentId, value: &str) -> SyncResult<NaiveDate> {
    value.parse().map_err(|_| SyncError::InvalidRecord {
        engagement: id.clone(),
        message: format!("malformed date: {value}"),
    })
}

fn parse_validity(id: &EmploymentId, from: &str, to: &str) -> SyncResult<ValidityInterval> {
    let from = parse_date(id, from)?;
    let to = if to == OPEN_END {
        None
    } else {
        Some(parse_date(id, to)?)
    };
    ValidityInterval::new(from, to).map_err(|e| SyncError::InvalidRecord {
        engagement: id.clone(),
        message: e.to_string(),
    })
}

fn parse_org_unit(id: &EmploymentId, value: &str) -> SyncResult<OrgUnitId> {
    OrgUnitId::parse(value).map_err(|_| SyncError::InvalidRecord {
        engagement: id.clone(),
        message: format!("malformed org unit reference: {value}"),
    })
}

fn validate_rate(id: &EmploymentId, rate: f64) -> SyncResult<f64> {
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(SyncError::InvalidRecord {
            engagement: id.clone(),
            message: format!("occupancy rate outside [0, 1]: {rate}"),
        })
    }
}
