use sieve_statsd::{CounterMetric, TimerMetric};

/// Counter metrics for the metrics catalog.
pub enum CatalogCounters {
    /// Incremented for every indexed metric name that is not a valid MRI.
    ///
    /// This metric is tagged with:
    ///  - `use_case`: The use case of the listing.
    InvalidMri,
}

impl CounterMetric for CatalogCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::InvalidMri => "catalog.invalid_mri",
        }
    }
}

/// Timer metrics for the metrics catalog.
///
/// All timers are tagged with:
///  - `use_case`: The use case of the request.
pub enum CatalogTimers {
    /// Time spent listing metrics.
    ListMetrics,
    /// Time spent loading details of a single metric.
    GetMetric,
    /// Time spent listing tag keys of a metric.
    ListTags,
    /// Time spent listing values of a tag.
    ListTagValues,
}

impl TimerMetric for CatalogTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::ListMetrics => "catalog.list_metrics.duration",
            Self::GetMetric => "catalog.get_metric.duration",
            Self::ListTags => "catalog.list_tags.duration",
            Self::ListTagValues => "catalog.list_tag_values.duration",
        }
    }
}
