use std::collections::BTreeSet;
use std::sync::Arc;

use hashbrown::HashMap;
use itertools::Itertools;
use serde::Serialize;
use sieve_base_schema::metrics::{MetricResourceIdentifier, MetricType, MetricUnit, UseCaseId};
use sieve_base_schema::organization::OrganizationId;
use sieve_base_schema::project::ProjectId;
use sieve_common::UnixTimestamp;
use sieve_indexer::{IndexScope, StringIndexer};
use sieve_statsd::metric;
use sieve_visibility::{BlockedMetrics, MetricBlockStore};

use crate::statsd::{CatalogCounters, CatalogTimers};
use crate::{CatalogError, MetricsStorage};

/// Blocking state of a metric in one project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingStatus {
    /// Whether the metric is blocked entirely.
    pub is_blocked: bool,
    /// Blocked tag keys in ascending order.
    pub blocked_tags: Vec<String>,
    /// The project this status applies to.
    pub project_id: ProjectId,
}

impl BlockingStatus {
    /// Computes the status of the metric `mri` from the blocking state of a project.
    ///
    /// A project without state blocks nothing.
    pub fn new(project_id: ProjectId, mri: &str, state: Option<&BlockedMetrics>) -> Self {
        Self {
            is_blocked: state.is_some_and(|state| state.is_metric_blocked(mri)),
            blocked_tags: state
                .map(|state| state.blocked_tags(mri).map(str::to_owned).collect())
                .unwrap_or_default(),
            project_id,
        }
    }
}

/// A metric in the catalog.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogEntry {
    /// The metric.
    pub mri: MetricResourceIdentifier<'static>,
    /// The name component of the MRI.
    pub name: String,
    /// The metric type.
    #[serde(rename = "type")]
    pub ty: MetricType,
    /// The unit of the metric.
    pub unit: MetricUnit,
    /// Query operations supported by the metric type.
    pub operations: &'static [&'static str],
    /// The requested projects which observed the metric, in ascending order.
    pub project_ids: Vec<ProjectId>,
    /// One status per observing project, in ascending project order.
    #[serde(rename = "blockingStatus")]
    pub blocking_status: Vec<BlockingStatus>,
}

impl CatalogEntry {
    fn new(
        mri: MetricResourceIdentifier<'static>,
        project_ids: Vec<ProjectId>,
        blocked: &HashMap<ProjectId, BlockedMetrics>,
    ) -> Self {
        let key = mri.to_string();

        let blocking_status = project_ids
            .iter()
            .map(|&project_id| BlockingStatus::new(project_id, &key, blocked.get(&project_id)))
            .collect();

        Self {
            name: mri.name.to_string(),
            ty: mri.ty,
            unit: mri.unit,
            operations: mri.ty.operations(),
            mri,
            project_ids,
            blocking_status,
        }
    }
}

/// Details of a single metric.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricDetails {
    /// The catalog entry of the metric.
    pub entry: CatalogEntry,
    /// Tag keys visible in at least one project, in ascending order.
    pub tags: Vec<String>,
    /// The latest observation in any of the projects.
    pub last_seen: Option<UnixTimestamp>,
}

/// A metric known to storage, with its tag keys in every observing project.
struct ObservedMetric {
    key: String,
    metric_id: u64,
    project_ids: Vec<ProjectId>,
    tag_keys: HashMap<ProjectId, BTreeSet<u64>>,
}

/// Lists metrics and their tags, annotated with blocking state.
#[derive(Clone, Debug)]
pub struct MetricsCatalog {
    indexer: Arc<dyn StringIndexer>,
    storage: Arc<dyn MetricsStorage>,
    block_store: Arc<dyn MetricBlockStore>,
}

impl MetricsCatalog {
    /// Creates a catalog on top of its three sources.
    pub fn new(
        indexer: Arc<dyn StringIndexer>,
        storage: Arc<dyn MetricsStorage>,
        block_store: Arc<dyn MetricBlockStore>,
    ) -> Self {
        Self {
            indexer,
            storage,
            block_store,
        }
    }

    /// Returns the metric storage backing this catalog.
    pub fn storage(&self) -> &Arc<dyn MetricsStorage> {
        &self.storage
    }

    /// Returns the block store backing this catalog.
    pub fn block_store(&self) -> &Arc<dyn MetricBlockStore> {
        &self.block_store
    }

    /// Lists all metrics observed in any of the projects, sorted by MRI.
    ///
    /// Blocked metrics are listed like all others, with their state in the blocking status. An
    /// empty list of projects yields an empty list without consulting any backend.
    pub async fn list_metrics(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        metric!(timer(CatalogTimers::ListMetrics), use_case = use_case.as_str(), {
            self.list_metrics_inner(org, projects, use_case).await
        })
    }

    async fn list_metrics_inner(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        if projects.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self
            .storage
            .observed_metrics(org, projects, use_case)
            .await?;
        let blocked = self.block_store.get_blocked_metrics(projects).await?;

        let scope = IndexScope::new(use_case, org);
        let ids: Vec<u64> = raw.iter().map(|raw| raw.metric_id).collect();
        let names = self.resolve(scope, &ids).await?;

        let mut entries = Vec::with_capacity(raw.len());
        for (raw, name) in raw.into_iter().zip(names) {
            let mri = match MetricResourceIdentifier::parse(&name) {
                Ok(mri) => mri.into_owned(),
                Err(error) => {
                    sieve_log::debug!(
                        error = &error as &dyn std::error::Error,
                        mri = %name,
                        "skipping indexed metric with invalid mri"
                    );
                    metric!(
                        counter(CatalogCounters::InvalidMri) += 1,
                        use_case = use_case.as_str()
                    );
                    continue;
                }
            };

            entries.push(CatalogEntry::new(mri, raw.project_ids, &blocked));
        }

        entries.sort_by_cached_key(|entry| entry.mri.to_string());
        Ok(entries)
    }

    /// Returns the details of a metric observed in any of the projects.
    pub async fn get_metric(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        mri: &MetricResourceIdentifier<'_>,
    ) -> Result<MetricDetails, CatalogError> {
        metric!(timer(CatalogTimers::GetMetric), use_case = use_case.as_str(), {
            self.get_metric_inner(org, projects, use_case, mri).await
        })
    }

    async fn get_metric_inner(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        mri: &MetricResourceIdentifier<'_>,
    ) -> Result<MetricDetails, CatalogError> {
        let observed = self.observe(org, projects, use_case, mri).await?;
        let blocked = self
            .block_store
            .get_blocked_metrics(&observed.project_ids)
            .await?;

        let scope = IndexScope::new(use_case, org);
        let tags = self.visible_tags(scope, &observed, &blocked).await?;
        let last_seen = self
            .storage
            .last_seen(org, &observed.project_ids, use_case, observed.metric_id)
            .await?;

        let entry = CatalogEntry::new(mri.clone().into_owned(), observed.project_ids, &blocked);

        Ok(MetricDetails {
            entry,
            tags,
            last_seen,
        })
    }

    /// Lists the tag keys of a metric visible in any of the projects.
    ///
    /// A project contributes no tags if it blocks the metric entirely, and never contributes the
    /// tags it blocks.
    pub async fn list_tags(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        mri: &MetricResourceIdentifier<'_>,
    ) -> Result<Vec<String>, CatalogError> {
        metric!(timer(CatalogTimers::ListTags), use_case = use_case.as_str(), {
            self.list_tags_inner(org, projects, use_case, mri).await
        })
    }

    async fn list_tags_inner(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        mri: &MetricResourceIdentifier<'_>,
    ) -> Result<Vec<String>, CatalogError> {
        if projects.is_empty() {
            return Ok(Vec::new());
        }

        let observed = self.observe(org, projects, use_case, mri).await?;
        let blocked = self
            .block_store
            .get_blocked_metrics(&observed.project_ids)
            .await?;

        self.visible_tags(IndexScope::new(use_case, org), &observed, &blocked)
            .await
    }

    /// Lists the values of a tag visible in any of the projects.
    ///
    /// Values are taken from the projects in which the tag is visible, following the same rules as
    /// [`list_tags`](Self::list_tags).
    pub async fn list_tag_values(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        mri: &MetricResourceIdentifier<'_>,
        tag: &str,
    ) -> Result<Vec<String>, CatalogError> {
        metric!(timer(CatalogTimers::ListTagValues), use_case = use_case.as_str(), {
            self.list_tag_values_inner(org, projects, use_case, mri, tag)
                .await
        })
    }

    async fn list_tag_values_inner(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        mri: &MetricResourceIdentifier<'_>,
        tag: &str,
    ) -> Result<Vec<String>, CatalogError> {
        if projects.is_empty() {
            return Ok(Vec::new());
        }

        let observed = self.observe(org, projects, use_case, mri).await?;

        let scope = IndexScope::new(use_case, org);
        let tag_key_id = self
            .indexer
            .lookup(scope, tag)
            .await?
            .ok_or_else(|| CatalogError::UnknownTag(tag.to_owned()))?;

        let blocked = self
            .block_store
            .get_blocked_metrics(&observed.project_ids)
            .await?;

        let visible_projects: Vec<ProjectId> = observed
            .project_ids
            .iter()
            .copied()
            .filter(|project| {
                let state = blocked.get(project);
                let hidden = state.is_some_and(|state| {
                    state.is_metric_blocked(&observed.key)
                        || state.is_tag_blocked(&observed.key, tag)
                });
                let has_tag = observed
                    .tag_keys
                    .get(project)
                    .is_some_and(|keys| keys.contains(&tag_key_id));
                !hidden && has_tag
            })
            .collect();

        if visible_projects.is_empty() {
            return Err(CatalogError::UnknownTag(tag.to_owned()));
        }

        let values = self
            .storage
            .tag_values(
                org,
                &visible_projects,
                use_case,
                observed.metric_id,
                tag_key_id,
            )
            .await?;

        let value_ids: Vec<u64> = values.into_values().flatten().sorted().dedup().collect();
        let values = self.resolve(scope, &value_ids).await?;

        Ok(values.into_iter().sorted().dedup().collect())
    }

    /// Looks up the metric and the projects which observed it.
    async fn observe(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        mri: &MetricResourceIdentifier<'_>,
    ) -> Result<ObservedMetric, CatalogError> {
        let key = mri.to_string();
        let scope = IndexScope::new(use_case, org);

        let Some(metric_id) = self.indexer.lookup(scope, &key).await? else {
            return Err(CatalogError::UnknownMetric(key));
        };

        let tag_keys = self
            .storage
            .tag_keys(org, projects, use_case, metric_id)
            .await?;
        if tag_keys.is_empty() {
            return Err(CatalogError::UnknownMetric(key));
        }

        Ok(ObservedMetric {
            key,
            metric_id,
            project_ids: tag_keys.keys().copied().sorted().collect(),
            tag_keys,
        })
    }

    async fn visible_tags(
        &self,
        scope: IndexScope,
        observed: &ObservedMetric,
        blocked: &HashMap<ProjectId, BlockedMetrics>,
    ) -> Result<Vec<String>, CatalogError> {
        let mri = observed.key.as_str();
        let candidates: Vec<(ProjectId, &BTreeSet<u64>)> = observed
            .tag_keys
            .iter()
            .filter(|(project, _)| {
                !blocked
                    .get(*project)
                    .is_some_and(|state| state.is_metric_blocked(mri))
            })
            .map(|(project, keys)| (*project, keys))
            .collect();

        let ids: Vec<u64> = candidates
            .iter()
            .flat_map(|(_, keys)| keys.iter().copied())
            .sorted()
            .dedup()
            .collect();
        let names: HashMap<u64, String> = ids
            .iter()
            .copied()
            .zip(self.resolve(scope, &ids).await?)
            .collect();

        let mut visible = BTreeSet::new();
        for (project, keys) in candidates {
            let state = blocked.get(&project);
            for id in keys {
                let Some(name) = names.get(id) else {
                    continue;
                };
                if !state.is_some_and(|state| state.is_tag_blocked(mri, name)) {
                    visible.insert(name.clone());
                }
            }
        }

        Ok(visible.into_iter().collect())
    }

    /// Resolves indexed ids, reporting integrity violations.
    async fn resolve(&self, scope: IndexScope, ids: &[u64]) -> Result<Vec<String>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.indexer.bulk_resolve(scope, ids).await.map_err(|error| {
            if error.is_integrity() {
                sieve_log::error!(
                    error = &error as &dyn std::error::Error,
                    scope = %scope,
                    "metrics index is inconsistent"
                );
            }
            CatalogError::from(error)
        })
    }
}
