use std::fmt;

use async_trait::async_trait;
use hashbrown::HashMap;
use sieve_base_schema::metrics::MetricResourceIdentifier;
use sieve_base_schema::project::ProjectId;
use sieve_redis::redis::{self, Script};
use sieve_redis::{AsyncRedisPool, RedisError};
use sieve_statsd::metric;

use crate::statsd::{BlockStoreCounters, BlockStoreTimers};
use crate::{BlockStoreError, BlockedMetrics, BlockingOperation, MetricBlockStore};

/// Keys holding the state of a single project.
///
/// All keys share the project as cluster hash tag.
struct ProjectKeys {
    prefix: String,
}

impl ProjectKeys {
    fn new(project: ProjectId) -> Self {
        Self {
            prefix: format!("sieve:visibility:{{{project}}}"),
        }
    }

    fn metrics(&self) -> String {
        format!("{}:metrics", self.prefix)
    }

    fn tracked(&self) -> String {
        format!("{}:tracked", self.prefix)
    }

    fn tags(&self, mri: &str) -> String {
        format!("{}:tags:{mri}", self.prefix)
    }
}

/// A [`MetricBlockStore`] storing its state in Redis.
///
/// Every update is a single script invocation and therefore atomic. Loading the state of any
/// number of projects takes two pipelined round trips: one for the blocked metrics and the list of
/// tracked metrics, and one for the blocked tags of all tracked metrics.
#[derive(Clone)]
pub struct RedisBlockStore {
    pool: AsyncRedisPool,
    script: Script,
}

impl RedisBlockStore {
    /// Creates a store on top of the given pool.
    pub fn new(pool: AsyncRedisPool) -> Self {
        Self {
            pool,
            script: Script::new(include_str!("update.lua")),
        }
    }
}

impl fmt::Debug for RedisBlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBlockStore")
            .field("pool", &self.pool)
            .finish()
    }
}

#[async_trait]
impl MetricBlockStore for RedisBlockStore {
    async fn update(
        &self,
        project: ProjectId,
        mri: &MetricResourceIdentifier<'_>,
        operation: &BlockingOperation,
    ) -> Result<(), BlockStoreError> {
        let mri = mri.to_string();
        let keys = ProjectKeys::new(project);

        let mut invocation = self.script.prepare_invoke();
        invocation
            .key(keys.metrics())
            .key(keys.tracked())
            .key(keys.tags(&mri))
            .arg(operation.name())
            .arg(&mri);

        for tag in operation.tags().into_iter().flatten() {
            invocation.arg(tag);
        }

        let mut connection = self.pool.get_connection().await?;
        invocation
            .invoke_async::<()>(&mut connection)
            .await
            .map_err(RedisError::Redis)?;

        Ok(())
    }

    async fn get_blocked_metrics(
        &self,
        projects: &[ProjectId],
    ) -> Result<HashMap<ProjectId, BlockedMetrics>, BlockStoreError> {
        let start = std::time::Instant::now();
        let mut result: HashMap<ProjectId, BlockedMetrics> = projects
            .iter()
            .map(|&project| (project, BlockedMetrics::default()))
            .collect();

        if projects.is_empty() {
            return Ok(result);
        }

        let mut connection = self.pool.get_connection().await?;

        let mut pipe = redis::pipe();
        for &project in projects {
            let keys = ProjectKeys::new(project);
            pipe.cmd("SMEMBERS").arg(keys.metrics());
            pipe.cmd("SMEMBERS").arg(keys.tracked());
        }
        let members: Vec<Vec<String>> = pipe
            .query_async(&mut connection)
            .await
            .map_err(RedisError::Redis)?;

        let mut tracked = Vec::new();
        for (&project, chunk) in projects.iter().zip(members.chunks(2)) {
            let [metrics, tracked_metrics] = chunk else {
                continue;
            };

            if let Some(state) = result.get_mut(&project) {
                state.metrics.extend(metrics.iter().cloned());
            }
            for mri in tracked_metrics {
                tracked.push((project, mri.clone()));
            }
        }

        if !tracked.is_empty() {
            let mut pipe = redis::pipe();
            for (project, mri) in &tracked {
                pipe.cmd("SMEMBERS").arg(ProjectKeys::new(*project).tags(mri));
            }
            let tags: Vec<Vec<String>> = pipe
                .query_async(&mut connection)
                .await
                .map_err(RedisError::Redis)?;

            for ((project, mri), tags) in tracked.into_iter().zip(tags) {
                if let Some(state) = result.get_mut(&project) {
                    state.tags.insert(mri, tags.into_iter().collect());
                }
            }
        }

        metric!(counter(BlockStoreCounters::RedisRead) += projects.len() as i64);
        metric!(
            timer(BlockStoreTimers::GetBlockedMetrics) = start.elapsed(),
            store = "redis"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use sieve_redis::RedisConfigOptions;
    use similar_asserts::assert_eq;

    use super::*;

    fn build_store() -> RedisBlockStore {
        let url = std::env::var("SIEVE_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());
        let pool = AsyncRedisPool::single(&url, &RedisConfigOptions::default()).unwrap();
        RedisBlockStore::new(pool)
    }

    /// A random project, so tests never see each other's state.
    fn project() -> ProjectId {
        ProjectId::new(rand::random())
    }

    fn mri(s: &str) -> MetricResourceIdentifier<'static> {
        MetricResourceIdentifier::parse(s).unwrap().into_owned()
    }

    fn tags(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_keys() {
        let keys = ProjectKeys::new(ProjectId::new(42));
        assert_eq!(keys.metrics(), "sieve:visibility:{42}:metrics");
        assert_eq!(keys.tracked(), "sieve:visibility:{42}:tracked");
        assert_eq!(
            keys.tags("c:custom/clicks@none"),
            "sieve:visibility:{42}:tags:c:custom/clicks@none"
        );
    }

    #[tokio::test]
    async fn test_block_unblock_metric() {
        let store = build_store();
        let (p1, p2) = (project(), project());
        let user = mri("s:custom/user@none");

        store.block_metric(p1, &user).await.unwrap();
        store.block_metric(p1, &user).await.unwrap();

        let blocked = store.get_blocked_metrics(&[p1, p2]).await.unwrap();
        assert_eq!(blocked[&p1].metrics, tags(&["s:custom/user@none"]));
        assert!(blocked[&p2].is_empty());

        store.unblock_metric(p1, &user).await.unwrap();
        let blocked = store.get_blocked_metrics(&[p1]).await.unwrap();
        assert!(blocked[&p1].is_empty());
    }

    #[tokio::test]
    async fn test_tags_retain_empty_entry() {
        let store = build_store();
        let p = project();
        let page_load = mri("d:custom/page_load@millisecond");

        store
            .block_tags(p, &page_load, tags(&["release", "transaction"]))
            .await
            .unwrap();
        store
            .unblock_tags(p, &page_load, tags(&["transaction"]))
            .await
            .unwrap();

        let blocked = store.get_blocked_metrics(&[p]).await.unwrap();
        assert_eq!(
            blocked[&p].tags.get("d:custom/page_load@millisecond"),
            Some(&tags(&["release"]))
        );

        store
            .unblock_tags(p, &page_load, tags(&["release"]))
            .await
            .unwrap();
        let blocked = store.get_blocked_metrics(&[p]).await.unwrap();
        assert!(blocked[&p].is_tracked("d:custom/page_load@millisecond"));
        assert_eq!(blocked[&p].blocked_tags("d:custom/page_load@millisecond").count(), 0);
    }

    #[tokio::test]
    async fn test_matches_memory_store() {
        let store = build_store();
        let memory = crate::MemoryBlockStore::new();
        let p = project();
        let clicks = mri("c:custom/clicks@none");

        let operations = [
            BlockingOperation::BlockTags { tags: tags(&["a", "b"]) },
            BlockingOperation::BlockMetric,
            BlockingOperation::UnblockTags { tags: tags(&["b", "c"]) },
            BlockingOperation::UnblockMetric,
            BlockingOperation::BlockTags { tags: tags(&["c"]) },
        ];

        for operation in &operations {
            store.apply(&[p], &clicks, operation).await.unwrap();
            memory.apply(&[p], &clicks, operation).await.unwrap();
        }

        let expected = memory.get_blocked_metrics(&[p]).await.unwrap();
        let actual = store.get_blocked_metrics(&[p]).await.unwrap();
        assert_eq!(actual[&p], expected[&p]);
    }
}
