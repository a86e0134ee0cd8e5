//! Blocking state of metrics per project.
//!
//! Operators can block a metric entirely, or block individual tag keys of a metric. Blocking is
//! scoped to a single project and never affects other projects. The state is consulted at query
//! time: the catalog annotates its entries with it and tag enumeration hides blocked keys.
//!
//! The state of a project is a [`BlockedMetrics`] value. It is mutated through
//! [`BlockingOperation`]s applied by a [`MetricBlockStore`]:
//!
//!  - [`MemoryBlockStore`]: in-process state, used for local development and tests.
//!  - `RedisBlockStore`: shared state in Redis, available with the `redis` feature.
//!
//! # Empty tag entries
//!
//! Unblocking the last blocked tag of a metric keeps an empty entry for that metric. An empty
//! entry means "tracked, nothing blocked". For visibility it is equivalent to no entry at all,
//! but it is returned from [`MetricBlockStore::get_blocked_metrics`].

#![warn(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use sieve_base_schema::metrics::MetricResourceIdentifier;
use sieve_base_schema::project::ProjectId;
use sieve_statsd::metric;

mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod statsd;

pub use self::error::*;
pub use self::memory::MemoryBlockStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisBlockStore;

use self::statsd::BlockStoreCounters;

/// The blocking state of a single project.
///
/// Metrics are identified by the canonical string of their MRI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockedMetrics {
    /// Fully blocked metrics.
    pub metrics: BTreeSet<String>,
    /// Blocked tag keys per metric.
    ///
    /// Entries may be empty if all tags of a metric have been unblocked again.
    pub tags: BTreeMap<String, BTreeSet<String>>,
}

impl BlockedMetrics {
    /// Returns `true` if the metric is blocked entirely.
    pub fn is_metric_blocked(&self, mri: &str) -> bool {
        self.metrics.contains(mri)
    }

    /// Returns the blocked tag keys of a metric in ascending order.
    pub fn blocked_tags(&self, mri: &str) -> impl Iterator<Item = &str> {
        self.tags
            .get(mri)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Returns `true` if the tag key is blocked for the metric.
    ///
    /// This does not consider whether the entire metric is blocked.
    pub fn is_tag_blocked(&self, mri: &str, tag: &str) -> bool {
        self.tags.get(mri).is_some_and(|tags| tags.contains(tag))
    }

    /// Returns `true` if there is a tag entry for the metric, even if it is empty.
    pub fn is_tracked(&self, mri: &str) -> bool {
        self.tags.contains_key(mri)
    }

    /// Returns `true` if nothing is blocked or tracked in this project.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.tags.is_empty()
    }

    /// Applies an operation for a metric to this state.
    ///
    /// This is the reference semantics shared by all store implementations.
    pub fn apply(&mut self, mri: &str, operation: &BlockingOperation) {
        match operation {
            BlockingOperation::BlockMetric => {
                self.metrics.insert(mri.to_owned());
            }
            BlockingOperation::UnblockMetric => {
                self.metrics.remove(mri);
            }
            BlockingOperation::BlockTags { tags } => {
                self.tags
                    .entry(mri.to_owned())
                    .or_default()
                    .extend(tags.iter().cloned());
            }
            BlockingOperation::UnblockTags { tags } => {
                if let Some(blocked) = self.tags.get_mut(mri) {
                    blocked.retain(|tag| !tags.contains(tag));
                }
            }
        }
    }
}

/// A change to the blocking state of a metric.
///
/// Serialized with an `operationType` discriminator, e.g.
/// `{"operationType": "blockTags", "tags": ["release"]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operationType", rename_all = "camelCase")]
pub enum BlockingOperation {
    /// Blocks the metric entirely.
    BlockMetric,
    /// Removes the full block of a metric. Blocked tags are unaffected.
    UnblockMetric,
    /// Adds tag keys to the blocked tags of the metric.
    BlockTags {
        /// The tag keys to block.
        tags: BTreeSet<String>,
    },
    /// Removes tag keys from the blocked tags of the metric.
    UnblockTags {
        /// The tag keys to unblock.
        tags: BTreeSet<String>,
    },
}

impl BlockingOperation {
    /// Returns the name of the operation as used in the wire format.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BlockMetric => "blockMetric",
            Self::UnblockMetric => "unblockMetric",
            Self::BlockTags { .. } => "blockTags",
            Self::UnblockTags { .. } => "unblockTags",
        }
    }

    /// Returns the tag keys this operation applies to.
    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::BlockMetric | Self::UnblockMetric => None,
            Self::BlockTags { tags } | Self::UnblockTags { tags } => Some(tags),
        }
    }
}

/// Storage for the blocking state of projects.
///
/// Every write is atomic for its (project, metric) pair and visible to the next read. There is no
/// coordination across projects: concurrent writers in different projects never wait on each
/// other, and concurrent writers on the same key resolve as last write wins.
#[async_trait]
pub trait MetricBlockStore: fmt::Debug + Send + Sync {
    /// Applies a single operation to the state of a project.
    async fn update(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
        operation: &BlockingOperation,
    ) -> Result<(), BlockStoreError>;

    /// Returns the state of all requested projects in a single batched read.
    ///
    /// Every requested project is contained in the result, with an empty state if nothing was ever
    /// blocked in it.
    async fn get_blocked_metrics(
        &self,
        projects: &[ProjectId],
    ) -> Result<HashMap<ProjectId, BlockedMetrics>, BlockStoreError>;

    /// Applies an operation to each project in order.
    ///
    /// Stops at the first failure. Since all operations are idempotent, the whole call can be
    /// retried safely.
    async fn apply(
        &self,
        projects: &[ProjectId],
        mri: &MetricResourceIdentifier<'_>,
        operation: &BlockingOperation,
    ) -> Result<(), BlockStoreError> {
        for &project in projects {
            self.update(project, mri, operation).await?;
            sieve_log::debug!(
                project = %project,
                mri = %mri,
                operation = operation.name(),
                "applied blocking operation"
            );
            metric!(
                counter(BlockStoreCounters::Operation) += 1,
                operation = operation.name()
            );
        }
        Ok(())
    }

    /// Blocks a metric in a project.
    async fn block_metric(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
    ) -> Result<(), BlockStoreError> {
        self.apply(&[project], mri, &BlockingOperation::BlockMetric)
            .await
    }

    /// Unblocks a metric in a project.
    async fn unblock_metric(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
    ) -> Result<(), BlockStoreError> {
        self.apply(&[project], mri, &BlockingOperation::UnblockMetric)
            .await
    }

    /// Blocks tag keys of a metric in a project.
    async fn block_tags(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
        tags: BTreeSet<String>,
    ) -> Result<(), BlockStoreError> {
        self.apply(&[project], mri, &BlockingOperation::BlockTags { tags })
            .await
    }

    /// Unblocks tag keys of a metric in a project.
    async fn unblock_tags(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
        tags: BTreeSet<String>,
    ) -> Result<(), BlockStoreError> {
        self.apply(&[project], mri, &BlockingOperation::UnblockTags { tags })
            .await
    }
}

#[async_trait]
impl<T: MetricBlockStore + ?Sized> MetricBlockStore for std::sync::Arc<T> {
    async fn update(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
        operation: &BlockingOperation,
    ) -> Result<(), BlockStoreError> {
        (**self).update(project, mri, operation).await
    }

    async fn get_blocked_metrics(
        &self,
        projects: &[ProjectId],
    ) -> Result<HashMap<ProjectId, BlockedMetrics>, BlockStoreError> {
        (**self).get_blocked_metrics(projects).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_apply_block_unblock_metric() {
        let mut state = BlockedMetrics::default();

        state.apply("s:custom/user@none", &BlockingOperation::BlockMetric);
        state.apply("s:custom/user@none", &BlockingOperation::BlockMetric);
        assert_eq!(state.metrics.len(), 1);
        assert!(state.is_metric_blocked("s:custom/user@none"));

        state.apply("s:custom/user@none", &BlockingOperation::UnblockMetric);
        state.apply("s:custom/user@none", &BlockingOperation::UnblockMetric);
        assert!(state.is_empty());
    }

    #[test]
    fn test_apply_unblock_tags_is_precise() {
        let mri = "d:custom/page_load@millisecond";
        let mut state = BlockedMetrics::default();

        state.apply(mri, &BlockingOperation::BlockTags { tags: tags(&["release"]) });
        state.apply(mri, &BlockingOperation::UnblockTags { tags: tags(&["transaction"]) });

        assert_eq!(state.blocked_tags(mri).collect::<Vec<_>>(), ["release"]);
        assert!(state.is_tag_blocked(mri, "release"));
        assert!(!state.is_tag_blocked(mri, "transaction"));
    }

    #[test]
    fn test_apply_retains_empty_entry() {
        let mri = "d:custom/page_load@millisecond";
        let mut state = BlockedMetrics::default();

        state.apply(mri, &BlockingOperation::BlockTags { tags: tags(&["release", "env"]) });
        state.apply(mri, &BlockingOperation::UnblockTags { tags: tags(&["env", "release"]) });

        assert!(state.is_tracked(mri));
        assert_eq!(state.blocked_tags(mri).count(), 0);
        assert!(!state.is_empty());
    }

    #[test]
    fn test_unblock_tags_without_entry_is_noop() {
        let mut state = BlockedMetrics::default();
        state.apply("c:custom/clicks@none", &BlockingOperation::UnblockTags { tags: tags(&["a"]) });
        assert!(state.is_empty());
    }

    #[test]
    fn test_metric_block_keeps_tags() {
        let mri = "c:custom/clicks@none";
        let mut state = BlockedMetrics::default();

        state.apply(mri, &BlockingOperation::BlockTags { tags: tags(&["release"]) });
        state.apply(mri, &BlockingOperation::BlockMetric);
        state.apply(mri, &BlockingOperation::UnblockMetric);

        assert!(!state.is_metric_blocked(mri));
        assert!(state.is_tag_blocked(mri, "release"));
    }

    #[test]
    fn test_operation_serde() {
        let operation: BlockingOperation =
            serde_json::from_str(r#"{"operationType": "blockTags", "tags": ["release"]}"#)
                .unwrap();
        assert_eq!(operation, BlockingOperation::BlockTags { tags: tags(&["release"]) });
        assert_eq!(operation.name(), "blockTags");

        let operation: BlockingOperation =
            serde_json::from_str(r#"{"operationType": "unblockMetric"}"#).unwrap();
        assert_eq!(operation, BlockingOperation::UnblockMetric);
        assert_eq!(operation.tags(), None);

        assert!(serde_json::from_str::<BlockingOperation>(r#"{"operationType": "purge"}"#).is_err());
        assert!(
            serde_json::from_str::<BlockingOperation>(r#"{"operationType": "blockTags"}"#)
                .is_err()
        );
    }
}
