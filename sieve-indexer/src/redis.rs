use std::fmt;

use async_trait::async_trait;
use sieve_redis::redis::{self, Pipeline};
use sieve_redis::{AsyncRedisPool, RedisError};
use sieve_statsd::metric;

use crate::statsd::IndexerCounters;
use crate::{IndexScope, IndexerError, StringIndexer};

/// Key of the id sequence shared by all scopes.
const SEQUENCE_KEY: &str = "sieve:idx:seq";

/// Maximum number of attempts to record a string that keeps being removed concurrently.
const MAX_RECORD_ATTEMPTS: usize = 3;

/// A [`StringIndexer`] storing its tables in Redis.
///
/// Every mapping is stored as two plain keys, one per direction. All keys of a scope share a
/// cluster hash tag, so batched reads within a scope hit a single node.
///
/// A new string is recorded by allocating an id from the global sequence, writing the reverse key
/// and then claiming the forward key with `SET NX`. The reverse key is always written first, so a
/// visible forward mapping can always be resolved. Writers that lose the race discard their id and
/// adopt the winner's.
#[derive(Clone)]
pub struct RedisIndexer {
    pool: AsyncRedisPool,
}

impl RedisIndexer {
    /// Creates an indexer on top of the given pool.
    pub fn new(pool: AsyncRedisPool) -> Self {
        Self { pool }
    }

    async fn record_one(
        &self,
        connection: &mut sieve_redis::AsyncRedisConnection,
        scope: IndexScope,
        string: &str,
    ) -> Result<u64, IndexerError> {
        let forward = forward_key(scope, string);

        for _ in 0..MAX_RECORD_ATTEMPTS {
            let existing: Option<u64> = redis::cmd("GET")
                .arg(&forward)
                .query_async(connection)
                .await
                .map_err(RedisError::Redis)?;

            if let Some(id) = existing {
                return Ok(id);
            }

            let id: u64 = redis::cmd("INCR")
                .arg(SEQUENCE_KEY)
                .query_async(connection)
                .await
                .map_err(RedisError::Redis)?;

            let reverse = reverse_key(scope, id);
            redis::cmd("SET")
                .arg(&reverse)
                .arg(string)
                .query_async::<()>(connection)
                .await
                .map_err(RedisError::Redis)?;

            let claimed: Option<String> = redis::cmd("SET")
                .arg(&forward)
                .arg(id)
                .arg("NX")
                .query_async(connection)
                .await
                .map_err(RedisError::Redis)?;

            if claimed.is_some() {
                metric!(
                    counter(IndexerCounters::Allocated) += 1,
                    use_case = scope.use_case.as_str()
                );
                return Ok(id);
            }

            metric!(counter(IndexerCounters::RecordRace) += 1);
            redis::cmd("DEL")
                .arg(&reverse)
                .query_async::<()>(connection)
                .await
                .map_err(RedisError::Redis)?;
        }

        // The forward key vanished after every lost race, so something deletes keys externally.
        sieve_log::error!(scope = %scope, "failed to record string in indexer");
        Err(IndexerError::Conflict { scope })
    }
}

impl fmt::Debug for RedisIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisIndexer")
            .field("pool", &self.pool)
            .finish()
    }
}

fn scope_prefix(scope: IndexScope) -> String {
    format!("sieve:idx:{{{scope}}}")
}

fn forward_key(scope: IndexScope, string: &str) -> String {
    format!("{}:s:{string}", scope_prefix(scope))
}

fn reverse_key(scope: IndexScope, id: u64) -> String {
    format!("{}:i:{id}", scope_prefix(scope))
}

#[async_trait]
impl StringIndexer for RedisIndexer {
    async fn record(&self, scope: IndexScope, string: &str) -> Result<u64, IndexerError> {
        let mut connection = self.pool.get_connection().await?;
        self.record_one(&mut connection, scope, string).await
    }

    async fn bulk_record(
        &self,
        scope: IndexScope,
        strings: &[&str],
    ) -> Result<Vec<u64>, IndexerError> {
        if strings.is_empty() {
            return Ok(Vec::new());
        }

        let mut connection = self.pool.get_connection().await?;

        let mut pipe = Pipeline::new();
        for string in strings {
            pipe.cmd("GET").arg(forward_key(scope, string));
        }
        let existing: Vec<Option<u64>> = pipe
            .query_async(&mut connection)
            .await
            .map_err(RedisError::Redis)?;

        let mut ids = Vec::with_capacity(strings.len());
        for (string, id) in strings.iter().zip(existing) {
            let id = match id {
                Some(id) => id,
                None => self.record_one(&mut connection, scope, string).await?,
            };
            ids.push(id);
        }

        Ok(ids)
    }

    async fn resolve(&self, scope: IndexScope, id: u64) -> Result<String, IndexerError> {
        let mut connection = self.pool.get_connection().await?;

        let string: Option<String> = redis::cmd("GET")
            .arg(reverse_key(scope, id))
            .query_async(&mut connection)
            .await
            .map_err(RedisError::Redis)?;

        string.ok_or(IndexerError::Unbound { scope, id })
    }

    async fn bulk_resolve(
        &self,
        scope: IndexScope,
        ids: &[u64],
    ) -> Result<Vec<String>, IndexerError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut connection = self.pool.get_connection().await?;

        let mut cmd = redis::cmd("MGET");
        for &id in ids {
            cmd.arg(reverse_key(scope, id));
        }
        let strings: Vec<Option<String>> = cmd
            .query_async(&mut connection)
            .await
            .map_err(RedisError::Redis)?;

        ids.iter()
            .zip(strings)
            .map(|(&id, string)| string.ok_or(IndexerError::Unbound { scope, id }))
            .collect()
    }

    async fn lookup(&self, scope: IndexScope, string: &str) -> Result<Option<u64>, IndexerError> {
        let mut connection = self.pool.get_connection().await?;

        let id = redis::cmd("GET")
            .arg(forward_key(scope, string))
            .query_async(&mut connection)
            .await
            .map_err(RedisError::Redis)?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use sieve_base_schema::metrics::UseCaseId;
    use sieve_base_schema::organization::OrganizationId;
    use sieve_redis::RedisConfigOptions;

    use super::*;

    fn build_indexer() -> RedisIndexer {
        let url = std::env::var("SIEVE_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());
        let pool = AsyncRedisPool::single(&url, &RedisConfigOptions::default()).unwrap();
        RedisIndexer::new(pool)
    }

    /// A scope with a random organization, so tests never see each other's strings.
    fn scope() -> IndexScope {
        IndexScope::new(UseCaseId::Custom, OrganizationId::new(rand::random()))
    }

    #[test]
    fn test_keys() {
        let scope = IndexScope::new(UseCaseId::Spans, OrganizationId::new(42));
        assert_eq!(forward_key(scope, "release"), "sieve:idx:{spans:42}:s:release");
        assert_eq!(reverse_key(scope, 7), "sieve:idx:{spans:42}:i:7");
    }

    #[tokio::test]
    async fn test_record_resolve() {
        let indexer = build_indexer();
        let scope = scope();

        let id = indexer.record(scope, "environment").await.unwrap();
        assert_eq!(indexer.record(scope, "environment").await.unwrap(), id);
        assert_eq!(indexer.resolve(scope, id).await.unwrap(), "environment");
        assert_eq!(indexer.lookup(scope, "environment").await.unwrap(), Some(id));
        assert_eq!(indexer.lookup(scope, "release").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unbound() {
        let indexer = build_indexer();
        let scope = scope();

        let id = indexer.record(scope, "environment").await.unwrap();
        let err = indexer.resolve(scope, id + 1_000_000).await.unwrap_err();
        assert!(err.is_integrity());
    }

    #[tokio::test]
    async fn test_bulk() {
        let indexer = build_indexer();
        let scope = scope();

        let first = indexer.record(scope, "a").await.unwrap();
        let ids = indexer.bulk_record(scope, &["a", "b", "a"]).await.unwrap();
        assert_eq!(ids[0], first);
        assert_eq!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[1]);

        let strings = indexer.bulk_resolve(scope, &ids).await.unwrap();
        assert_eq!(strings, ["a", "b", "a"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_record_converges() {
        let indexer = build_indexer();
        let scope = scope();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let indexer = indexer.clone();
                tokio::spawn(async move { indexer.record(scope, "transaction").await.unwrap() })
            })
            .collect();

        let ids = futures::future::try_join_all(tasks).await.unwrap();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(indexer.resolve(scope, ids[0]).await.unwrap(), "transaction");
    }
}
