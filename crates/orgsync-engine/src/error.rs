//! Error taxonomy for reconciliation runs.

use chrono::NaiveDate;
use orgsync_core::{EmploymentId, PersonKey};

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reconciling one person.
///
/// Every variant carries enough context (person key, engagement id)
/// for manual correction; because the engine is idempotent, a
/// corrected re-run only reprocesses records still divergent from the
/// registry.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Backend or network failure. Not retried inside the engine;
    /// retry policy belongs to the caller.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The source reported a status code outside the known
    /// enumeration. Fatal for the current record only.
    #[error("Unknown status code '{code}' for person {person}, engagement {engagement}")]
    UnknownStatusCode {
        /// The offending code.
        code: String,
        /// Person being reconciled.
        person: PersonKey,
        /// Engagement the record belongs to.
        engagement: EmploymentId,
    },

    /// More than one engagement is marked primary for the same
    /// instant. Fatal for the person; never resolved by picking one
    /// arbitrarily.
    #[error("More than one primary engagement for person {person} at {date}: {engagements:?}")]
    InconsistentPrimary {
        /// Person whose registry state is inconsistent.
        person: PersonKey,
        /// Instant at which the assertion failed.
        date: NaiveDate,
        /// The engagements simultaneously marked primary.
        engagements: Vec<EmploymentId>,
    },

    /// More than one registry entry matches an engagement's business
    /// key. Fatal for the person.
    #[error("Employment id {engagement} not unique in registry: {matches} matches")]
    AmbiguousEngagement {
        /// The ambiguous business key.
        engagement: EmploymentId,
        /// Number of registry entries found.
        matches: usize,
    },

    /// The registry rejected a mutation (excluding the documented
    /// "no new registration" no-op response).
    #[error("Registry rejected {operation} for engagement {engagement}: {message}")]
    Registry {
        /// The attempted operation.
        operation: String,
        /// Engagement the mutation targeted.
        engagement: EmploymentId,
        /// Registry response detail.
        message: String,
    },

    /// A source record failed validation at the ingestion boundary
    /// (malformed date, rate outside `[0, 1]`, inverted interval).
    #[error("Invalid source record for engagement {engagement}: {message}")]
    InvalidRecord {
        /// Engagement the record belongs to.
        engagement: EmploymentId,
        /// What was wrong with it.
        message: String,
    },
}
