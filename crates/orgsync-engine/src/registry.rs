//! Registry collaborator traits.
//!
//! The registry itself (HTTP client, database, whatever backs it) is
//! an external collaborator. The engine only needs two capability
//! seams: reading the current state and writing mutations. Both are
//! synchronous request/response from the engine's point of view — no
//! batching, retrying or timeouts happen on this side of the trait.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orgsync_core::{
    EmploymentId, Engagement, EngagementKind, OrgUnitId, Person, PersonKey, ValidityInterval,
};

use crate::error::SyncResult;

/// Full field set for creating an engagement.
///
/// The classification is always [`EngagementKind::NonPrimary`] at
/// creation; the primary selector rewrites it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementFields {
    /// Business key.
    pub employment_id: EmploymentId,
    /// Unit the engagement belongs to.
    pub org_unit: OrgUnitId,
    /// Job-function label.
    pub job_function: String,
    /// Initial classification.
    pub kind: EngagementKind,
    /// Occupancy rate, when reported.
    pub occupancy_rate: Option<f64>,
}

/// Changed fields for an engagement edit. `None` means unchanged;
/// the registry models every change as a discrete validity-stamped
/// fact, so a patch carries only what actually differs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementPatch {
    /// New unit, if the engagement moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit: Option<OrgUnitId>,
    /// New job function, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_function: Option<String>,
    /// New occupancy rate, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy_rate: Option<f64>,
    /// New classification, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EngagementKind>,
}

impl EngagementPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.org_unit.is_none()
            && self.job_function.is_none()
            && self.occupancy_rate.is_none()
            && self.kind.is_none()
    }
}

/// Outcome of a registry write.
///
/// The registry answers some edits with a documented "no new
/// registration" business response when the payload matches what it
/// already holds. That is success-no-op, not failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The mutation was applied.
    Applied,
    /// The registry already held the fact; nothing changed.
    NoNewRegistration,
}

/// Read access to the registry's current state.
#[async_trait]
pub trait RegistryReader: Send + Sync {
    /// Look up a person by correlation key.
    async fn find_person(&self, key: &PersonKey) -> SyncResult<Option<Person>>;

    /// Look up the engagement a business key refers to.
    ///
    /// Implementations must return
    /// [`SyncError::AmbiguousEngagement`](crate::SyncError::AmbiguousEngagement)
    /// when more than one registry entry matches the key.
    async fn find_engagement(
        &self,
        person: &PersonKey,
        id: &EmploymentId,
    ) -> SyncResult<Option<Engagement>>;

    /// All engagements the registry holds for a person.
    async fn engagements_for_person(&self, person: &PersonKey) -> SyncResult<Vec<Engagement>>;
}

/// Write access to the registry.
///
/// Each call is all-or-nothing; a non-success response (other than
/// the documented no-op) surfaces as
/// [`SyncError::Registry`](crate::SyncError::Registry) with no
/// partial application assumed.
#[async_trait]
pub trait RegistryWriter: Send + Sync {
    /// Create a person, returning the registry-assigned id.
    async fn create_person(&self, key: &PersonKey, name: &str) -> SyncResult<Uuid>;

    /// Update a person's display name.
    async fn update_person(&self, key: &PersonKey, name: &str) -> SyncResult<WriteOutcome>;

    /// Create an engagement, returning the registry-assigned id.
    async fn create_engagement(
        &self,
        person: &PersonKey,
        fields: &EngagementFields,
        validity: ValidityInterval,
    ) -> SyncResult<Uuid>;

    /// Apply changed fields to an engagement over a validity window.
    async fn edit_engagement(
        &self,
        id: &EmploymentId,
        changes: &EngagementPatch,
        validity: ValidityInterval,
    ) -> SyncResult<WriteOutcome>;

    /// End an engagement's current validity at `end_date`.
    async fn terminate_engagement(
        &self,
        id: &EmploymentId,
        end_date: NaiveDate,
    ) -> SyncResult<WriteOutcome>;
}
