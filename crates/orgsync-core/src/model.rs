//! Registry domain records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ids::{EmploymentId, OrgUnitId, PersonKey};
use crate::validity::ValidityInterval;

/// A person known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Registry-assigned id.
    pub uuid: Uuid,
    /// Stable correlation key from the upstream source.
    pub key: PersonKey,
    /// Display name.
    pub name: String,
}

/// An organizational unit. Read-only from the engine's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    /// Unit id.
    pub id: OrgUnitId,
    /// Parent unit; `None` for the root.
    pub parent: Option<OrgUnitId>,
    /// Unit type label, e.g. "Afdeling".
    pub unit_type: String,
    /// Display name.
    pub name: String,
}

/// Derived classification of an engagement.
///
/// Never supplied by the source; the primary selector recomputes it
/// whenever a person's set of concurrently active engagements changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    /// The single authoritative engagement for an instant.
    Primary,
    /// Any other concurrently active engagement.
    NonPrimary,
}

impl EngagementKind {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Primary => "primary",
            EngagementKind::NonPrimary => "non_primary",
        }
    }
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EngagementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(EngagementKind::Primary),
            "non_primary" | "non-primary" => Ok(EngagementKind::NonPrimary),
            _ => Err(format!("Unknown engagement kind: {s}")),
        }
    }
}

/// One recorded classification fact: a kind over a validity window.
///
/// An engagement can be primary for one stretch of its lifetime and
/// non-primary for another, so the classification is a list of
/// validity-scoped facts rather than a single engagement-wide value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// The classification in force.
    pub kind: EngagementKind,
    /// When it holds.
    pub validity: ValidityInterval,
}

/// A person's employment relationship to one organizational unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    /// Registry-assigned id.
    pub uuid: Uuid,
    /// Business key from the upstream source.
    pub employment_id: EmploymentId,
    /// Unit the engagement belongs to.
    pub org_unit: OrgUnitId,
    /// Job-function label.
    pub job_function: String,
    /// Derived classification facts, ordered, non-overlapping. A day
    /// no fact covers counts as non-primary.
    pub classifications: Vec<Classification>,
    /// Fraction of a full position, in `[0, 1]`. Missing when the
    /// source did not report working time.
    pub occupancy_rate: Option<f64>,
    /// When the engagement is valid.
    pub validity: ValidityInterval,
}

impl Engagement {
    /// Occupancy rate with a missing rate treated as zero.
    #[must_use]
    pub fn effective_rate(&self) -> f64 {
        self.occupancy_rate.unwrap_or(0.0)
    }

    /// The recorded classification on `date`.
    #[must_use]
    pub fn kind_at(&self, date: NaiveDate) -> EngagementKind {
        self.classifications
            .iter()
            .find(|c| c.validity.contains(date))
            .map_or(EngagementKind::NonPrimary, |c| c.kind)
    }

    /// Record `kind` over `validity`, clipping any overlapping facts
    /// so the list stays non-overlapping.
    pub fn set_classification(&mut self, kind: EngagementKind, validity: ValidityInterval) {
        let mut next = Vec::with_capacity(self.classifications.len() + 2);
        for span in self.classifications.drain(..) {
            if !span.validity.overlaps(&validity) {
                next.push(span);
                continue;
            }
            // Head: the overlapping span started earlier, so the part
            // before the new window survives unchanged.
            if span.validity.from < validity.from {
                if let Some(head_to) = validity.from.pred_opt() {
                    next.push(Classification {
                        kind: span.kind,
                        validity: ValidityInterval {
                            from: span.validity.from,
                            to: Some(head_to),
                        },
                    });
                }
            }
            // Tail: the overlapping span reaches past the new window.
            if let Some(new_to) = validity.to {
                let reaches_past = span.validity.to.is_none_or(|old_to| old_to > new_to);
                if reaches_past {
                    if let Some(tail_from) = new_to.succ_opt() {
                        next.push(Classification {
                            kind: span.kind,
                            validity: ValidityInterval {
                                from: tail_from,
                                to: span.validity.to,
                            },
                        });
                    }
                }
            }
        }
        next.push(Classification { kind, validity });
        next.sort_by_key(|c| c.validity.from);
        self.classifications = next;
    }
}

/// Employment status codes as reported by the upstream feed.
///
/// The enumeration is exhaustive on purpose: every dispatch over it
/// is a compile-time-checked match, and an unrecognized code is
/// rejected when the raw record is parsed, never silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    /// Code `0`: employment agreed but not yet started. Unhandled —
    /// surfaced as a warning, no mutation.
    NotStarted,
    /// Code `1`: active employment.
    Active,
    /// Code `3`: leave of absence. Unhandled — surfaced as a warning,
    /// no mutation.
    Leave,
    /// Code `8`: employment ended.
    Ended,
    /// Code `9`: employment ended (administrative closure).
    Closed,
    /// Code `S`: employment deleted at the source.
    Deleted,
}

impl EmploymentStatus {
    /// Parse a vendor status code.
    pub fn from_code(code: &str) -> Result<Self, UnknownStatusCode> {
        match code {
            "0" => Ok(EmploymentStatus::NotStarted),
            "1" => Ok(EmploymentStatus::Active),
            "3" => Ok(EmploymentStatus::Leave),
            "8" => Ok(EmploymentStatus::Ended),
            "9" => Ok(EmploymentStatus::Closed),
            "S" => Ok(EmploymentStatus::Deleted),
            _ => Err(UnknownStatusCode {
                code: code.to_string(),
            }),
        }
    }

    /// The vendor code for this status.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            EmploymentStatus::NotStarted => "0",
            EmploymentStatus::Active => "1",
            EmploymentStatus::Leave => "3",
            EmploymentStatus::Ended => "8",
            EmploymentStatus::Closed => "9",
            EmploymentStatus::Deleted => "S",
        }
    }

    /// Whether the status may produce create/edit mutations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, EmploymentStatus::Active)
    }

    /// Whether the status forces termination.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        matches!(
            self,
            EmploymentStatus::Ended | EmploymentStatus::Closed | EmploymentStatus::Deleted
        )
    }

    /// Whether the status is a documented gap (logged, no mutation).
    #[must_use]
    pub fn is_unhandled(&self) -> bool {
        matches!(self, EmploymentStatus::NotStarted | EmploymentStatus::Leave)
    }
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error for a status code outside the known enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatusCode {
    /// The offending code as reported by the source.
    pub code: String,
}

impl fmt::Display for UnknownStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown employment status code: {}", self.code)
    }
}

impl std::error::Error for UnknownStatusCode {}
