use sieve_redis::RedisError;

/// An error returned by a [`MetricBlockStore`](crate::MetricBlockStore).
#[derive(Debug, thiserror::Error)]
pub enum BlockStoreError {
    /// The backing store failed.
    #[error("failed to access the block store")]
    Redis(#[from] RedisError),
}
