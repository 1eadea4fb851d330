//! Engine configuration.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use orgsync_core::OrgUnitId;

/// Configuration for a reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Effective date stamped on edit windows. Defaults to the day
    /// the run executes.
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,

    /// Org units whose engagements are excluded from the registry.
    /// A source record pointing at one of these is skipped with a
    /// warning; the unit cannot be removed at the source but must
    /// not appear in the registry.
    #[serde(default)]
    pub filter_unit_ids: Vec<OrgUnitId>,
}

impl SyncConfig {
    /// The effective date for this run.
    #[must_use]
    pub fn resolve_effective_date(&self) -> NaiveDate {
        self.effective_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Whether a unit is on the filter list.
    #[must_use]
    pub fn is_filtered(&self, unit: &OrgUnitId) -> bool {
        self.filter_unit_ids.contains(unit)
    }
}
