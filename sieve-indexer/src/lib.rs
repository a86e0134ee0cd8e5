//! String indexer for metric names.
//!
//! The indexer maps strings, such as MRIs, tag keys and tag values, to compact integer ids. All
//! mappings are scoped by an [`IndexScope`], a pair of use case and organization. Within a scope,
//! the mapping is injective and append-only: once a string has been recorded, it keeps its id
//! forever.
//!
//! Implementations:
//!  - [`MemoryIndexer`]: in-process tables, used for local development and tests.
//!  - `RedisIndexer`: shared tables in Redis, available with the `redis` feature.
//!  - [`CachingIndexer`]: a read-through LRU cache in front of any other indexer.

#![warn(missing_docs)]

use std::fmt;

use async_trait::async_trait;
use sieve_base_schema::metrics::UseCaseId;
use sieve_base_schema::organization::OrganizationId;

mod cache;
mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod statsd;

pub use self::cache::CachingIndexer;
pub use self::error::*;
pub use self::memory::MemoryIndexer;
#[cfg(feature = "redis")]
pub use self::redis::RedisIndexer;

/// The scope of an indexed string.
///
/// Ids are only meaningful within the scope in which they were recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexScope {
    /// The use case the string belongs to.
    pub use_case: UseCaseId,
    /// The organization the string belongs to.
    pub organization_id: OrganizationId,
}

impl IndexScope {
    /// Creates a new scope.
    pub fn new(use_case: UseCaseId, organization_id: OrganizationId) -> Self {
        Self {
            use_case,
            organization_id,
        }
    }
}

impl fmt::Display for IndexScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.use_case, self.organization_id)
    }
}

/// Maps strings to integer ids and back.
#[async_trait]
pub trait StringIndexer: fmt::Debug + Send + Sync {
    /// Returns the id for the string, allocating a new one if the string is not yet known.
    ///
    /// The same input always yields the same id, also when multiple callers race to record it
    /// for the first time.
    async fn record(&self, scope: IndexScope, string: &str) -> Result<u64, IndexerError>;

    /// Records multiple strings, returning their ids in the same order.
    async fn bulk_record(
        &self,
        scope: IndexScope,
        strings: &[&str],
    ) -> Result<Vec<u64>, IndexerError> {
        let mut ids = Vec::with_capacity(strings.len());
        for string in strings {
            ids.push(self.record(scope, string).await?);
        }
        Ok(ids)
    }

    /// Returns the string bound to the id.
    ///
    /// Fails with [`IndexerError::Unbound`] if no string is bound to the id in this scope.
    async fn resolve(&self, scope: IndexScope, id: u64) -> Result<String, IndexerError>;

    /// Resolves multiple ids, returning their strings in the same order.
    async fn bulk_resolve(
        &self,
        scope: IndexScope,
        ids: &[u64],
    ) -> Result<Vec<String>, IndexerError> {
        let mut strings = Vec::with_capacity(ids.len());
        for id in ids {
            strings.push(self.resolve(scope, *id).await?);
        }
        Ok(strings)
    }

    /// Returns the id of a string without allocating one.
    async fn lookup(&self, scope: IndexScope, string: &str) -> Result<Option<u64>, IndexerError>;
}

#[async_trait]
impl<T: StringIndexer + ?Sized> StringIndexer for std::sync::Arc<T> {
    async fn record(&self, scope: IndexScope, string: &str) -> Result<u64, IndexerError> {
        (**self).record(scope, string).await
    }

    async fn bulk_record(
        &self,
        scope: IndexScope,
        strings: &[&str],
    ) -> Result<Vec<u64>, IndexerError> {
        (**self).bulk_record(scope, strings).await
    }

    async fn resolve(&self, scope: IndexScope, id: u64) -> Result<String, IndexerError> {
        (**self).resolve(scope, id).await
    }

    async fn bulk_resolve(
        &self,
        scope: IndexScope,
        ids: &[u64],
    ) -> Result<Vec<String>, IndexerError> {
        (**self).bulk_resolve(scope, ids).await
    }

    async fn lookup(&self, scope: IndexScope, string: &str) -> Result<Option<u64>, IndexerError> {
        (**self).lookup(scope, string).await
    }
}
