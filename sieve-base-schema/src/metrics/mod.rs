//! Type definitions for metrics and their identifiers.

mod mri;
mod units;
mod use_case;

pub use self::mri::*;
pub use self::units::*;
pub use self::use_case::*;

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Upper bound for the length of a normalized metric name.
///
/// Together with the unit size (15) and the type and namespace, this keeps an MRI below 200
/// characters.
const METRIC_NAME_MAX_SIZE: usize = 150;

/// Validates a metric name and normalizes it. This is the bare name, i.e. without type,
/// namespace or unit.
///
/// Metric names cannot be empty and must begin with an ASCII letter. Consecutive characters
/// outside of ASCII alphanumerics, underscores and periods are replaced with a single
/// underscore, and the result is truncated to 150 characters.
pub fn try_normalize_metric_name(name: &str) -> Option<Cow<'_, str>> {
    // Note: `-` intentionally missing from this list.
    static NORMALIZE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new("[^a-zA-Z0-9_.]+").unwrap());

    if !can_be_valid_metric_name(name) {
        return None;
    }

    let normalized_name = NORMALIZE_RE.replace_all(name, "_");

    if normalized_name.len() <= METRIC_NAME_MAX_SIZE {
        return Some(normalized_name);
    }

    // After normalization every character is a single byte, so slicing by index is safe.
    Some(match normalized_name {
        Cow::Borrowed(value) => Cow::Borrowed(&value[..METRIC_NAME_MAX_SIZE]),
        Cow::Owned(mut value) => {
            value.truncate(METRIC_NAME_MAX_SIZE);
            Cow::Owned(value)
        }
    })
}

/// Returns whether [`try_normalize_metric_name`] can normalize the passed name.
pub fn can_be_valid_metric_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_valid_names() {
        let name = try_normalize_metric_name("page_load.total").unwrap();
        assert!(matches!(name, Cow::Borrowed("page_load.total")));
    }

    #[test]
    fn test_normalize_replaces_runs() {
        assert_eq!(
            try_normalize_metric_name("blob--size??x").unwrap(),
            "blob_size_x"
        );
    }

    #[test]
    fn test_normalize_rejects_leading_digit() {
        assert!(try_normalize_metric_name("1st").is_none());
        assert!(try_normalize_metric_name("").is_none());
    }

    #[test]
    fn test_normalize_truncates() {
        let long = "a".repeat(200);
        assert_eq!(try_normalize_metric_name(&long).unwrap().len(), 150);
    }
}
