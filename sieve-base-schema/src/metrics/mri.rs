use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::{MetricUnit, UseCaseId};

/// The type of a [`MetricResourceIdentifier`], determining its aggregation and evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum MetricType {
    /// Counts instances of an event.
    ///
    /// Counters are declared as `"c"`.
    Counter,
    /// Builds a statistical distribution over values reported.
    ///
    /// Based on individual reported values, distributions allow to query the maximum, minimum, or
    /// average of the reported values, as well as statistical quantiles.
    ///
    /// Distributions are declared as `"d"`.
    Distribution,
    /// Counts the number of unique reported values.
    ///
    /// Sets are declared as `"s"`.
    Set,
    /// Stores absolute snapshots of values.
    ///
    /// In addition to plain [counters](Self::Counter), gauges store a snapshot of the maximum,
    /// minimum and sum of all values, as well as the last reported value.
    ///
    /// Gauges are declared as `"g"`.
    Gauge,
}

impl MetricType {
    /// Return the shortcode for this metric type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "c",
            MetricType::Distribution => "d",
            MetricType::Set => "s",
            MetricType::Gauge => "g",
        }
    }

    /// Returns the query operations that can be applied to metrics of this type.
    ///
    /// The list is sorted alphabetically.
    pub fn operations(&self) -> &'static [&'static str] {
        match self {
            MetricType::Counter => &["sum"],
            MetricType::Distribution => &[
                "avg", "count", "max", "min", "p50", "p75", "p90", "p95", "p99", "sum",
            ],
            MetricType::Set => &["count_unique"],
            MetricType::Gauge => &["avg", "count", "last", "max", "min", "sum"],
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "c" => Self::Counter,
            "d" => Self::Distribution,
            "s" => Self::Set,
            "g" => Self::Gauge,
            _ => return Err(ParseMetricError::InvalidType),
        })
    }
}

sieve_common::impl_str_serde!(MetricType, "a metric type shortcode");

/// An error returned when MRIs cannot be parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseMetricError {
    /// The type is missing or not one of `c`, `d`, `s` or `g`.
    #[error("invalid metric type")]
    InvalidType,
    /// The namespace is missing or not a known use case.
    #[error("invalid metric namespace")]
    InvalidNamespace,
    /// The name is missing or does not start with a letter.
    #[error("invalid metric name")]
    InvalidName,
    /// The unit is missing or cannot be parsed.
    #[error("invalid metric unit")]
    InvalidUnit,
}

/// A unique identifier for metrics including typing and namespacing.
///
/// MRIs have the format `<type>:<namespace>/<name>@<unit>`. All four components are required, and
/// the namespace must be a known [`UseCaseId`]. Names are normalized on parsing, so the
/// [`Display`](fmt::Display) output is the canonical form used as identity in storage and in the
/// blocking state.
///
/// # Example
///
/// ```
/// use sieve_base_schema::metrics::MetricResourceIdentifier;
///
/// let string = "d:custom/page_load@millisecond";
/// let mri = MetricResourceIdentifier::parse(string).expect("should parse");
/// assert_eq!(mri.to_string(), string);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetricResourceIdentifier<'a> {
    /// The type of a metric, determining its aggregation and evaluation.
    pub ty: MetricType,

    /// The namespace for this metric, which is its use case.
    pub namespace: UseCaseId,

    /// The display name of the metric in the allowed character set.
    pub name: Cow<'a, str>,

    /// The unit of the metric value.
    pub unit: MetricUnit,
}

impl<'a> MetricResourceIdentifier<'a> {
    /// Parses and validates an MRI.
    pub fn parse(string: &'a str) -> Result<Self, ParseMetricError> {
        let (raw_ty, rest) = string
            .split_once(':')
            .ok_or(ParseMetricError::InvalidType)?;
        let ty = raw_ty.parse()?;

        let (raw_namespace, rest) = rest
            .split_once('/')
            .ok_or(ParseMetricError::InvalidNamespace)?;
        let namespace = raw_namespace
            .parse()
            .map_err(|_| ParseMetricError::InvalidNamespace)?;

        let (raw_name, raw_unit) = rest
            .rsplit_once('@')
            .ok_or(ParseMetricError::InvalidUnit)?;
        if raw_unit.is_empty() {
            return Err(ParseMetricError::InvalidUnit);
        }
        let unit = raw_unit
            .parse()
            .map_err(|_| ParseMetricError::InvalidUnit)?;

        let name =
            crate::metrics::try_normalize_metric_name(raw_name).ok_or(ParseMetricError::InvalidName)?;

        Ok(MetricResourceIdentifier {
            ty,
            namespace,
            name,
            unit,
        })
    }

    /// Converts the MRI into an owned version with a static lifetime.
    pub fn into_owned(self) -> MetricResourceIdentifier<'static> {
        MetricResourceIdentifier {
            ty: self.ty,
            namespace: self.namespace,
            name: Cow::Owned(self.name.into_owned()),
            unit: self.unit,
        }
    }
}

impl<'de> Deserialize<'de> for MetricResourceIdentifier<'static> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Deserialize without allocation, if possible.
        let string = <Cow<'de, str>>::deserialize(deserializer)?;
        let result = MetricResourceIdentifier::parse(&string)
            .map_err(serde::de::Error::custom)?
            .into_owned();

        Ok(result)
    }
}

impl Serialize for MetricResourceIdentifier<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl fmt::Display for MetricResourceIdentifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `<ty>:<ns>/<name>@<unit>`
        write!(
            f,
            "{}:{}/{}@{}",
            self.ty, self.namespace, self.name, self.unit
        )
    }
}
