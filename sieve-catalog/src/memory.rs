use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;
use sieve_base_schema::metrics::UseCaseId;
use sieve_base_schema::organization::OrganizationId;
use sieve_base_schema::project::ProjectId;
use sieve_common::UnixTimestamp;
use sieve_indexer::{IndexScope, StringIndexer};

use crate::{MetricObservation, MetricsStorage, RawMetric, StorageError};

/// What is known about a metric in one project.
#[derive(Debug)]
struct MetricRecord {
    /// Tag key id to tag value ids.
    tags: BTreeMap<u64, BTreeSet<u64>>,
    last_seen: UnixTimestamp,
}

/// Metric id to the projects which observed it.
type ScopeData = BTreeMap<u64, BTreeMap<ProjectId, MetricRecord>>;

/// An in-process [`MetricsStorage`].
///
/// Strings of stored observations are recorded through the indexer, the storage itself only holds
/// ids.
pub struct MemoryMetricsStorage {
    indexer: Arc<dyn StringIndexer>,
    scopes: RwLock<HashMap<(OrganizationId, UseCaseId), ScopeData>>,
}

impl MemoryMetricsStorage {
    /// Creates an empty storage indexing through the given indexer.
    pub fn new(indexer: Arc<dyn StringIndexer>) -> Self {
        Self {
            indexer,
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// Calls `f` for the record of every requested project that observed the metric.
    fn for_each_record<F>(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        metric_id: u64,
        mut f: F,
    ) where
        F: FnMut(ProjectId, &MetricRecord),
    {
        let scopes = self.scopes.read();
        let Some(records) = scopes
            .get(&(org, use_case))
            .and_then(|metrics| metrics.get(&metric_id))
        else {
            return;
        };

        for project in projects {
            if let Some(record) = records.get(project) {
                f(*project, record);
            }
        }
    }
}

impl fmt::Debug for MemoryMetricsStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMetricsStorage")
            .field("indexer", &self.indexer)
            .field("scopes", &self.scopes.read().len())
            .finish()
    }
}

#[async_trait]
impl MetricsStorage for MemoryMetricsStorage {
    async fn observed_metrics(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
    ) -> Result<Vec<RawMetric>, StorageError> {
        let scopes = self.scopes.read();
        let Some(metrics) = scopes.get(&(org, use_case)) else {
            return Ok(Vec::new());
        };

        let raw = metrics
            .iter()
            .filter_map(|(&metric_id, records)| {
                let mut project_ids: Vec<_> = projects
                    .iter()
                    .copied()
                    .filter(|project| records.contains_key(project))
                    .collect();
                project_ids.sort_unstable();
                project_ids.dedup();

                (!project_ids.is_empty()).then_some(RawMetric {
                    metric_id,
                    project_ids,
                })
            })
            .collect();

        Ok(raw)
    }

    async fn tag_keys(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        metric_id: u64,
    ) -> Result<HashMap<ProjectId, BTreeSet<u64>>, StorageError> {
        let mut result = HashMap::new();
        self.for_each_record(org, projects, use_case, metric_id, |project, record| {
            result.insert(project, record.tags.keys().copied().collect());
        });
        Ok(result)
    }

    async fn tag_values(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        metric_id: u64,
        tag_key_id: u64,
    ) -> Result<HashMap<ProjectId, BTreeSet<u64>>, StorageError> {
        let mut result = HashMap::new();
        self.for_each_record(org, projects, use_case, metric_id, |project, record| {
            if let Some(values) = record.tags.get(&tag_key_id) {
                result.insert(project, values.clone());
            }
        });
        Ok(result)
    }

    async fn last_seen(
        &self,
        org: OrganizationId,
        projects: &[ProjectId],
        use_case: UseCaseId,
        metric_id: u64,
    ) -> Result<Option<UnixTimestamp>, StorageError> {
        let mut last_seen = None;
        self.for_each_record(org, projects, use_case, metric_id, |_, record| {
            last_seen = last_seen.max(Some(record.last_seen));
        });
        Ok(last_seen)
    }

    async fn store(
        &self,
        org: OrganizationId,
        project: ProjectId,
        use_case: UseCaseId,
        observations: &[MetricObservation],
    ) -> Result<(), StorageError> {
        let scope = IndexScope::new(use_case, org);

        // Index everything up front, the lock must not be held across awaits.
        let mut indexed = Vec::with_capacity(observations.len());
        for observation in observations {
            let metric_id = self
                .indexer
                .record(scope, &observation.mri.to_string())
                .await?;

            let mut tags = Vec::with_capacity(observation.tags.len());
            for (key, value) in &observation.tags {
                let key_id = self.indexer.record(scope, key).await?;
                let value_id = self.indexer.record(scope, value).await?;
                tags.push((key_id, value_id));
            }

            indexed.push((metric_id, tags, observation.timestamp));
        }

        let mut scopes = self.scopes.write();
        let metrics = scopes.entry((org, use_case)).or_default();

        for (metric_id, tags, timestamp) in indexed {
            let record = metrics
                .entry(metric_id)
                .or_default()
                .entry(project)
                .or_insert_with(|| MetricRecord {
                    tags: BTreeMap::new(),
                    last_seen: timestamp,
                });

            record.last_seen = record.last_seen.max(timestamp);
            for (key, value) in tags {
                record.tags.entry(key).or_default().insert(value);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sieve_base_schema::metrics::MetricResourceIdentifier;
    use sieve_indexer::MemoryIndexer;

    use super::*;

    const ORG: OrganizationId = OrganizationId::new(1);
    const P1: ProjectId = ProjectId::new(1);
    const P2: ProjectId = ProjectId::new(2);

    fn observation(mri: &str, tags: &[(&str, &str)], timestamp: u64) -> MetricObservation {
        MetricObservation {
            mri: MetricResourceIdentifier::parse(mri).unwrap().into_owned(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timestamp: UnixTimestamp::from_secs(timestamp),
        }
    }

    #[tokio::test]
    async fn test_store_and_query() {
        let indexer = Arc::new(MemoryIndexer::new());
        let storage = MemoryMetricsStorage::new(indexer.clone());
        let scope = IndexScope::new(UseCaseId::Custom, ORG);

        storage
            .store(
                ORG,
                P1,
                UseCaseId::Custom,
                &[
                    observation("c:custom/clicks@none", &[("release", "1.0")], 10),
                    observation("c:custom/clicks@none", &[("release", "2.0")], 20),
                ],
            )
            .await
            .unwrap();
        storage
            .store(
                ORG,
                P2,
                UseCaseId::Custom,
                &[observation("c:custom/clicks@none", &[("env", "prod")], 5)],
            )
            .await
            .unwrap();

        let clicks = indexer
            .lookup(scope, "c:custom/clicks@none")
            .await
            .unwrap()
            .unwrap();

        let raw = storage
            .observed_metrics(ORG, &[P2, P1], UseCaseId::Custom)
            .await
            .unwrap();
        assert_eq!(
            raw,
            [RawMetric {
                metric_id: clicks,
                project_ids: vec![P1, P2],
            }]
        );

        let release = indexer.lookup(scope, "release").await.unwrap().unwrap();
        let values = storage
            .tag_values(ORG, &[P1, P2], UseCaseId::Custom, clicks, release)
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[&P1].len(), 2);

        let keys = storage
            .tag_keys(ORG, &[P2], UseCaseId::Custom, clicks)
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert!(!keys[&P2].contains(&release));

        let last_seen = storage
            .last_seen(ORG, &[P1, P2], UseCaseId::Custom, clicks)
            .await
            .unwrap();
        assert_eq!(last_seen, Some(UnixTimestamp::from_secs(20)));
    }

    #[tokio::test]
    async fn test_scoped_by_use_case_and_project() {
        let storage = MemoryMetricsStorage::new(Arc::new(MemoryIndexer::new()));

        storage
            .store(
                ORG,
                P1,
                UseCaseId::Custom,
                &[observation("c:custom/clicks@none", &[], 10)],
            )
            .await
            .unwrap();

        let other_use_case = storage
            .observed_metrics(ORG, &[P1], UseCaseId::Spans)
            .await
            .unwrap();
        assert!(other_use_case.is_empty());

        let other_project = storage
            .observed_metrics(ORG, &[P2], UseCaseId::Custom)
            .await
            .unwrap();
        assert!(other_project.is_empty());
    }
}
