use thiserror::Error;

use crate::config::{RedisConfig, RedisConfigOptions};

/// This is an unconstructable type to make `Option<AsyncRedisPool>` zero-sized.
#[derive(Clone, Debug)]
pub enum AsyncRedisPool {}

/// An error returned from `AsyncRedisPool`.
#[derive(Debug, Error)]
#[error("redis support is not compiled in")]
pub struct RedisError;

impl AsyncRedisPool {
    /// Creates an `AsyncRedisPool` in cluster configuration.
    ///
    /// Always fails, since redis support requires the `impl` feature.
    pub fn cluster<'a>(
        _servers: impl IntoIterator<Item = &'a str>,
        _opts: &RedisConfigOptions,
    ) -> Result<Self, RedisError> {
        Err(RedisError)
    }

    /// Creates an `AsyncRedisPool` in single-node configuration.
    ///
    /// Always fails, since redis support requires the `impl` feature.
    pub fn single(_server: &str, _opts: &RedisConfigOptions) -> Result<Self, RedisError> {
        Err(RedisError)
    }

    /// Creates an `AsyncRedisPool` from configuration.
    ///
    /// Always fails, since redis support requires the `impl` feature.
    pub fn from_config(_config: &RedisConfig) -> Result<Self, RedisError> {
        Err(RedisError)
    }
}
