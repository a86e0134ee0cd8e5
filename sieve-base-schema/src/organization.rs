//! Contains [`OrganizationId`].

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The unique identifier of a Sentry organization.
///
/// All indexed strings and metric catalogs are scoped by an organization.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct OrganizationId(u64);

impl OrganizationId {
    /// Creates a new organization ID from its numeric value.
    #[inline]
    pub const fn new(id: u64) -> Self {
        OrganizationId(id)
    }

    /// Returns the numeric value of the organization ID.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for OrganizationId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(OrganizationId)
    }
}
