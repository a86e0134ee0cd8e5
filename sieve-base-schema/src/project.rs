//! Contains [`ProjectId`].

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The unique identifier of a Sentry project.
///
/// Blocking state is always scoped to a single project.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ProjectId(u64);

impl ProjectId {
    /// Creates a new project ID from its numeric value.
    #[inline]
    pub const fn new(id: u64) -> Self {
        ProjectId(id)
    }

    /// Returns the numeric value of the project ID.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for ProjectId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ProjectId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_id() {
        assert_eq!("42".parse::<ProjectId>().unwrap(), ProjectId::new(42));
        assert!("-1".parse::<ProjectId>().is_err());
        assert!("abc".parse::<ProjectId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let id: ProjectId = serde_json::from_str("17").unwrap();
        assert_eq!(id.value(), 17);
        assert_eq!(serde_json::to_string(&id).unwrap(), "17");
    }
}
