use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use hashbrown::HashMap;
use serde::Deserialize;
use sieve_base_schema::metrics::{MetricResourceIdentifier, UseCaseId};
use sieve_base_schema::organization::OrganizationId;
use sieve_base_schema::project::ProjectId;
use sieve_common::UnixTimestamp;

use crate::StorageError;

/// A metric observed in at least one project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMetric {
    /// The indexed id of the metric's MRI.
    pub metric_id: u64,
    /// The requested projects which observed the metric, in ascending order.
    pub project_ids: Vec<ProjectId>,
}

/// A single observation of a metric with its tags.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MetricObservation {
    /// The metric that was observed.
    pub mri: MetricResourceIdentifier<'static>,
    /// Tag keys and values of the observation.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// The time of the observation.
    pub timestamp: UnixTimestamp,
}

/// Storage of observed metrics.
///
/// Storage only deals in indexed ids. All queries are scoped to an organization and use case and
/// restricted to the requested projects.
#[async_trait]
pub trait MetricsStorage: fmt::Debug + Send + Sync {
    /// Returns all metrics observed in any of the projects.
    async fn observed_metrics(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
    ) -> Result<Vec<RawMetric>, StorageError>;

    /// Returns the ids of tag keys observed with a metric, per project.
    ///
    /// Projects that never observed the metric are not contained in the result.
    async fn tag_keys(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        metric_id: u64,
    ) -> Result<HashMap<ProjectId, BTreeSet<u64>>, StorageError>;

    /// Returns the ids of values observed for a tag key of a metric, per project.
    async fn tag_values(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        metric_id: u64,
        tag_key_id: u64,
    ) -> Result<HashMap<ProjectId, BTreeSet<u64>>, StorageError>;

    /// Returns the latest time the metric was observed in any of the projects.
    async fn last_seen(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        metric_id: u64,
    ) -> Result<Option<UnixTimestamp>, StorageError>;

    /// Stores observations of a project.
    async fn store(
        &self,
        org: OrganizationId,
        project: ProjectId,
        use_case: UseCaseId,
        observations: &[MetricObservation],
    ) -> Result<(), StorageError>;
}
