use sieve_redis::RedisError;

use crate::IndexScope;

/// An error returned by a [`StringIndexer`](crate::StringIndexer).
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// No string is bound to the id in the given scope.
    ///
    /// Ids are only ever handed out after their string has been stored, so this indicates
    /// corrupted or foreign data.
    #[error("no string bound to id {id} in scope {scope}")]
    Unbound {
        /// The scope of the lookup.
        scope: IndexScope,
        /// The id without a string.
        id: u64,
    },

    /// A string could not be recorded because its mapping kept disappearing concurrently.
    #[error("failed to record string in scope {scope}")]
    Conflict {
        /// The scope of the write.
        scope: IndexScope,
    },

    /// The backing store failed.
    #[error("failed to access the indexer storage")]
    Redis(#[from] RedisError),
}

impl IndexerError {
    /// Returns `true` if this error signals an integrity violation rather than an outage.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Unbound { .. } | Self::Conflict { .. })
    }
}
