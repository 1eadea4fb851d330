//! Shared data model for the orgsync reconciliation engine.
//!
//! This crate holds the value types exchanged between the snapshot
//! loaders, the diff engine and the registry collaborators: typed
//! identifiers, validity intervals and the employment records
//! themselves. It carries no I/O.

pub mod ids;
pub mod model;
pub mod validity;

pub use ids::{EmploymentId, OrgUnitId, PersonKey};
pub use model::{Classification, Engagement, EngagementKind, EmploymentStatus, OrgUnit, Person};
pub use validity::ValidityInterval;
