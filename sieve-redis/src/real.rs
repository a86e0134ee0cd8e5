use std::fmt;
use std::time::Duration;

use deadpool::managed::{BuildError, PoolError};
use deadpool_redis::cluster::{
    Config as ClusterConfig, Connection as ClusterConnection, Pool as ClusterPool,
};
use deadpool_redis::redis::{Cmd, Pipeline, RedisFuture, Value};
use deadpool_redis::{
    Config as SingleConfig, ConfigError, Connection as SingleConnection, Pool as SinglePool,
    Runtime,
};
use thiserror::Error;

use crate::config::{RedisConfig, RedisConfigOptions};

pub use deadpool_redis::redis;

/// An error returned from [`AsyncRedisPool`] and the commands sent through it.
#[derive(Debug, Error)]
pub enum RedisError {
    /// A command failed or the connection broke.
    #[error("failed to communicate with redis")]
    Redis(#[source] redis::RedisError),

    /// No connection could be checked out of the pool in time.
    #[error("failed to get a redis connection from the pool")]
    Pool(#[source] PoolError<redis::RedisError>),

    /// The pool could not be built from the configuration.
    #[error("failed to create redis pool")]
    CreatePool(#[from] BuildError),

    /// The configuration contains an invalid url.
    #[error("invalid redis configuration")]
    Config(#[from] ConfigError),
}

/// A connection pool to either a single Redis instance or a Redis cluster.
///
/// Cloning the pool is cheap and shares the underlying connections.
#[derive(Clone)]
pub enum AsyncRedisPool {
    /// A pool of connections to a Redis cluster.
    Cluster(ClusterPool),
    /// A pool of connections to a single Redis instance.
    Single(SinglePool),
}

impl AsyncRedisPool {
    /// Creates a connection pool for a Redis cluster.
    pub fn cluster<'a>(
        servers: impl IntoIterator<Item = &'a str>,
        opts: &RedisConfigOptions,
    ) -> Result<Self, RedisError> {
        let servers = servers.into_iter().map(str::to_owned).collect::<Vec<_>>();
        let timeout = Some(Duration::from_secs(opts.connection_timeout));

        let pool = ClusterConfig::from_urls(servers)
            .builder()?
            .max_size(opts.max_connections as usize)
            .runtime(Runtime::Tokio1)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .build()?;

        Ok(Self::Cluster(pool))
    }

    /// Creates a connection pool for a single Redis instance.
    pub fn single(server: &str, opts: &RedisConfigOptions) -> Result<Self, RedisError> {
        let timeout = Some(Duration::from_secs(opts.connection_timeout));

        let pool = SingleConfig::from_url(server)
            .builder()?
            .max_size(opts.max_connections as usize)
            .runtime(Runtime::Tokio1)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .build()?;

        Ok(Self::Single(pool))
    }

    /// Creates a connection pool for the given configuration.
    ///
    /// Connections are established lazily, so this does not fail for unreachable servers.
    pub fn from_config(config: &RedisConfig) -> Result<Self, RedisError> {
        match config {
            RedisConfig::Cluster {
                cluster_nodes,
                options,
            } => Self::cluster(cluster_nodes.iter().map(String::as_str), options),
            RedisConfig::Single(server) => Self::single(server, &config.options()),
            RedisConfig::SingleWithOpts { server, options } => Self::single(server, options),
        }
    }

    /// Checks a connection out of the pool.
    ///
    /// The connection returns to the pool when dropped.
    pub async fn get_connection(&self) -> Result<AsyncRedisConnection, RedisError> {
        let connection = match self {
            Self::Cluster(pool) => {
                AsyncRedisConnection::Cluster(pool.get().await.map_err(RedisError::Pool)?)
            }
            Self::Single(pool) => {
                AsyncRedisConnection::Single(pool.get().await.map_err(RedisError::Pool)?)
            }
        };

        Ok(connection)
    }
}

impl fmt::Debug for AsyncRedisPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, status) = match self {
            Self::Cluster(pool) => ("Cluster", pool.status()),
            Self::Single(pool) => ("Single", pool.status()),
        };

        f.debug_struct("AsyncRedisPool")
            .field("mode", &name)
            .field("connections", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

/// A pooled connection to either a single Redis instance or a Redis cluster.
pub enum AsyncRedisConnection {
    /// A connection to a Redis cluster.
    Cluster(ClusterConnection),
    /// A connection to a single Redis instance.
    Single(SingleConnection),
}

impl fmt::Debug for AsyncRedisConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cluster(_) => "Cluster",
            Self::Single(_) => "Single",
        };
        f.debug_tuple(name).finish()
    }
}

impl redis::aio::ConnectionLike for AsyncRedisConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            Self::Cluster(conn) => conn.req_packed_command(cmd),
            Self::Single(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            Self::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
            Self::Single(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Cluster(conn) => conn.get_db(),
            Self::Single(conn) => conn.get_db(),
        }
    }
}
