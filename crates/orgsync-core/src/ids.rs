//! Typed identifiers.
//!
//! Newtype wrappers for the business keys flowing between the source
//! feed and the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable correlation key for a person, e.g. a national identifier.
///
/// The registry may assign its own internal id to a person; this key
/// is what the upstream feed correlates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonKey(String);

impl PersonKey {
    /// Create a key from its string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PersonKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Stable employment identifier assigned by the upstream HR system.
///
/// Distinct from any registry-assigned id; the registry stores it as
/// the engagement's business key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmploymentId(String);

impl EmploymentId {
    /// Create an id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the id, when the feed uses numeric ids.
    #[must_use]
    pub fn numeric(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for EmploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EmploymentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Ord for EmploymentId {
    /// Numeric ids order by value and sort before non-numeric ids,
    /// which order lexicographically. The string itself breaks
    /// numeric ties (`"050"` vs `"50"`) so the order agrees with
    /// `Eq`. This order drives the deterministic primary tie-break,
    /// so it must not depend on input arrangement.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EmploymentId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Unique identifier for an organizational unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgUnitId(Uuid);

impl OrgUnitId {
    /// Create a new random OrgUnitId.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an OrgUnitId from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse from a string representation.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for OrgUnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrgUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrgUnitId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for OrgUnitId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<OrgUnitId> for Uuid {
    fn from(id: OrgUnitId) -> Self {
        id.0
    }
}
