use std::num::NonZeroUsize;
use std::sync::Arc;

use hashbrown::HashMap;
use sieve_catalog::{MemoryMetricsStorage, MetricsCatalog};
use sieve_config::Config;
use sieve_indexer::{CachingIndexer, MemoryIndexer, StringIndexer};
use sieve_redis::{RedisConfig, RedisError};
use sieve_visibility::{MemoryBlockStore, MetricBlockStore};

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Creating the Redis connection pool failed.
    #[error("failed to create redis pool")]
    Redis(#[from] RedisError),

    /// Redis is configured, but support was not compiled in.
    #[error("redis is configured, but sieve was compiled without the redis feature")]
    RedisNotSupported,
}

type Backends = (Arc<dyn StringIndexer>, Arc<dyn MetricBlockStore>);

#[cfg(feature = "redis")]
fn redis_backends(config: &RedisConfig) -> Result<Backends, ServiceError> {
    use sieve_indexer::RedisIndexer;
    use sieve_redis::AsyncRedisPool;
    use sieve_visibility::RedisBlockStore;

    let pool = AsyncRedisPool::from_config(config)?;
    Ok((
        Arc::new(RedisIndexer::new(pool.clone())),
        Arc::new(RedisBlockStore::new(pool)),
    ))
}

#[cfg(not(feature = "redis"))]
fn redis_backends(_config: &RedisConfig) -> Result<Backends, ServiceError> {
    Err(ServiceError::RedisNotSupported)
}

#[derive(Debug)]
struct StateInner {
    config: Arc<Config>,
    catalog: MetricsCatalog,
    tokens: HashMap<String, Vec<String>>,
}

/// Server state shared by all request handlers.
///
/// Cloning the state is cheap.
#[derive(Clone, Debug)]
pub struct ServiceState {
    inner: Arc<StateInner>,
}

impl ServiceState {
    /// Creates all backends according to the configuration.
    ///
    /// With a `redis` section, the indexer and the block store are backed by Redis. Otherwise, all
    /// state is held in memory and lost on restart.
    pub fn start(config: Arc<Config>) -> Result<Self, ServiceError> {
        let (indexer, block_store) = match config.redis() {
            Some(redis) => redis_backends(redis)?,
            None => {
                sieve_log::info!("no redis configured, using in-memory backends");
                let indexer: Arc<dyn StringIndexer> = Arc::new(MemoryIndexer::new());
                let block_store: Arc<dyn MetricBlockStore> = Arc::new(MemoryBlockStore::new());
                (indexer, block_store)
            }
        };

        let indexer: Arc<dyn StringIndexer> = match NonZeroUsize::new(config.indexer_cache_size())
        {
            Some(capacity) => Arc::new(CachingIndexer::new(indexer, capacity)),
            None => indexer,
        };

        let storage = Arc::new(MemoryMetricsStorage::new(indexer.clone()));
        let catalog = MetricsCatalog::new(indexer, storage, block_store);

        Ok(Self::from_parts(config, catalog))
    }

    /// Creates the state from an existing catalog.
    pub fn from_parts(config: Arc<Config>, catalog: MetricsCatalog) -> Self {
        let tokens = config
            .api_tokens()
            .iter()
            .map(|token| (token.token.clone(), token.scopes.clone()))
            .collect();

        Self {
            inner: Arc::new(StateInner {
                config,
                catalog,
                tokens,
            }),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the metrics catalog.
    pub fn catalog(&self) -> &MetricsCatalog {
        &self.inner.catalog
    }

    /// Returns the scopes granted to an API token, or `None` if the token is not known.
    pub fn token_scopes(&self, token: &str) -> Option<&[String]> {
        self.inner.tokens.get(token).map(Vec::as_slice)
    }
}
