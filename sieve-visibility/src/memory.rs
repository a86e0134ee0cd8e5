use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::Mutex;
use sieve_base_schema::metrics::MetricResourceIdentifier;
use sieve_base_schema::project::ProjectId;
use sieve_statsd::metric;

use crate::statsd::BlockStoreTimers;
use crate::{BlockStoreError, BlockedMetrics, BlockingOperation, MetricBlockStore};

type SharedState = Arc<Mutex<BlockedMetrics>>;

/// An in-process [`MetricBlockStore`].
///
/// Each project has its own lock, so writes to different projects proceed in parallel.
#[derive(Default)]
pub struct MemoryBlockStore {
    projects: papaya::HashMap<ProjectId, SharedState>,
}

impl MemoryBlockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, project: ProjectId) -> SharedState {
        let projects = self.projects.pin();
        if let Some(state) = projects.get(&project) {
            return state.clone();
        }

        match projects.try_insert(project, SharedState::default()) {
            Ok(inserted) => inserted.clone(),
            Err(occupied) => occupied.current.clone(),
        }
    }

    fn get(&self, project: ProjectId) -> BlockedMetrics {
        match self.projects.pin().get(&project) {
            Some(state) => state.lock().clone(),
            None => BlockedMetrics::default(),
        }
    }
}

impl fmt::Debug for MemoryBlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBlockStore")
            .field("projects", &self.projects.len())
            .finish()
    }
}

#[async_trait]
impl MetricBlockStore for MemoryBlockStore {
    async fn update(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
        operation: &BlockingOperation,
    ) -> Result<(), BlockStoreError> {
        let state = self.get_or_create(project);
        state.lock().apply(&mri.to_string(), operation);
        Ok(())
    }

    async fn get_blocked_metrics(
        &self,
        projects: &[ProjectId],
    ) -> Result<HashMap<ProjectId, BlockedMetrics>, BlockStoreError> {
        let result = metric!(timer(BlockStoreTimers::GetBlockedMetrics), store = "memory", {
            projects
                .iter()
                .map(|&project| (project, self.get(project)))
                .collect()
        });

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use futures::executor::block_on;
    use similar_asserts::assert_eq;

    use super::*;

    fn mri(s: &str) -> MetricResourceIdentifier<'static> {
        MetricResourceIdentifier::parse(s).unwrap().into_owned()
    }

    fn tags(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    const P1: ProjectId = ProjectId::new(1);
    const P2: ProjectId = ProjectId::new(2);

    #[tokio::test]
    async fn test_block_unblock_metric() {
        let store = MemoryBlockStore::new();
        let user = mri("s:custom/user@none");

        store.block_metric(P1, &user).await.unwrap();
        store.block_metric(P1, &user).await.unwrap();

        let blocked = store.get_blocked_metrics(&[P1, P2]).await.unwrap();
        assert_eq!(blocked[&P1].metrics, tags(&["s:custom/user@none"]));
        assert!(blocked[&P2].is_empty());

        store.unblock_metric(P1, &user).await.unwrap();
        let blocked = store.get_blocked_metrics(&[P1]).await.unwrap();
        assert!(!blocked[&P1].is_metric_blocked("s:custom/user@none"));
    }

    #[tokio::test]
    async fn test_tags_set_difference() {
        let store = MemoryBlockStore::new();
        let page_load = mri("d:custom/page_load@millisecond");

        store
            .block_tags(P2, &page_load, tags(&["release"]))
            .await
            .unwrap();
        store
            .unblock_tags(P2, &page_load, tags(&["transaction"]))
            .await
            .unwrap();

        let blocked = store.get_blocked_metrics(&[P2]).await.unwrap();
        assert_eq!(
            blocked[&P2].tags.get("d:custom/page_load@millisecond"),
            Some(&tags(&["release"]))
        );

        store
            .unblock_tags(P2, &page_load, tags(&["release"]))
            .await
            .unwrap();
        let blocked = store.get_blocked_metrics(&[P2]).await.unwrap();
        assert_eq!(
            blocked[&P2].tags.get("d:custom/page_load@millisecond"),
            Some(&BTreeSet::new())
        );
    }

    #[test]
    fn test_apply_to_multiple_projects() {
        let store = MemoryBlockStore::new();
        let clicks = mri("c:custom/clicks@none");

        let captures = sieve_statsd::with_capturing_test_client(|| {
            block_on(store.apply(&[P1, P2], &clicks, &BlockingOperation::BlockMetric)).unwrap();
        });
        assert_eq!(
            captures,
            [
                "visibility.operation:1|c|#operation:blockMetric",
                "visibility.operation:1|c|#operation:blockMetric",
            ]
        );

        let blocked = block_on(store.get_blocked_metrics(&[P1, P2])).unwrap();
        assert!(blocked[&P1].is_metric_blocked("c:custom/clicks@none"));
        assert!(blocked[&P2].is_metric_blocked("c:custom/clicks@none"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tag_writes() {
        let store = Arc::new(MemoryBlockStore::new());
        let clicks = mri("c:custom/clicks@none");

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                let clicks = clicks.clone();
                tokio::spawn(async move {
                    store
                        .block_tags(P1, &clicks, tags(&[&format!("tag{i}")]))
                        .await
                        .unwrap();
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        let blocked = store.get_blocked_metrics(&[P1]).await.unwrap();
        assert_eq!(blocked[&P1].blocked_tags("c:custom/clicks@none").count(), 32);
    }
}
