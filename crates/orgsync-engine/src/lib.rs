//! Temporal diff-reconciliation engine.
//!
//! Keeps a central organizational registry (persons, org units,
//! employment engagements) consistent with periodic snapshots from an
//! authoritative HR source. Given an incoming snapshot and the
//! registry's current state, the engine computes the minimal mutation
//! set (create/edit/terminate) that converges the registry to the
//! source of truth, and independently derives which single engagement
//! is primary for every instant of a person's employment history.
//!
//! Network clients, vendor-format parsing and settings loading are
//! external collaborators; they meet this crate at [`source`] (what
//! they hand in) and [`registry`] (what the engine hands back).

pub mod config;
pub mod dedup;
pub mod diff;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod primary;
pub mod push;
pub mod registry;
pub mod source;

pub use config::SyncConfig;
pub use dedup::DedupCache;
pub use diff::{Action, DiffEngine};
pub use error::{SyncError, SyncResult};
pub use pipeline::{RunReport, RunStatistics, SyncPipeline};
pub use primary::{ClassificationEdit, PrimarySelector};
pub use registry::{RegistryReader, RegistryWriter, WriteOutcome};
pub use source::{PersonSnapshot, SourceRecord};
