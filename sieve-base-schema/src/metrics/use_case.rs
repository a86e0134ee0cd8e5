use std::fmt;
use std::str::FromStr;

/// The use case of a metric, also used as the namespace segment of an MRI.
///
/// Use cases partition the metric space: indexed strings, catalogs and storage are always
/// scoped by a use case. The set of use cases is closed; parsing an unknown use case fails
/// instead of falling back to a catch-all value.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum UseCaseId {
    /// Metrics extracted from sessions.
    Sessions,
    /// Metrics extracted from transaction events.
    Transactions,
    /// Metrics extracted from spans.
    Spans,
    /// User-defined metrics directly sent by SDKs and applications.
    Custom,
}

impl UseCaseId {
    /// Returns all use cases in their canonical order.
    pub const fn all() -> [Self; 4] {
        [Self::Sessions, Self::Transactions, Self::Spans, Self::Custom]
    }

    /// Returns the string representation of this use case.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::Transactions => "transactions",
            Self::Spans => "spans",
            Self::Custom => "custom",
        }
    }
}

/// Error returned for use case strings that are not part of [`UseCaseId`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid use case: {0:?}")]
pub struct ParseUseCaseError(pub String);

impl FromStr for UseCaseId {
    type Err = ParseUseCaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|use_case| use_case.as_str() == s)
            .ok_or_else(|| ParseUseCaseError(s.to_owned()))
    }
}

impl fmt::Display for UseCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sieve_common::impl_str_serde!(UseCaseId, "a known metrics use case");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known() {
        for use_case in UseCaseId::all() {
            assert_eq!(use_case.as_str().parse::<UseCaseId>().unwrap(), use_case);
        }
    }

    #[test]
    fn test_parse_unknown() {
        let error = "not-a-use-case".parse::<UseCaseId>().unwrap_err();
        assert_eq!(error.to_string(), "invalid use case: \"not-a-use-case\"");
        assert!("Custom".parse::<UseCaseId>().is_err());
        assert!("".parse::<UseCaseId>().is_err());
    }

    #[test]
    fn test_deserialize_unknown_fails() {
        assert!(serde_json::from_str::<UseCaseId>("\"transactions\"").is_ok());
        assert!(serde_json::from_str::<UseCaseId>("\"unsupported\"").is_err());
    }
}
