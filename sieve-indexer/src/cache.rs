use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use sieve_statsd::metric;

use crate::statsd::IndexerCounters;
use crate::{IndexScope, IndexerError, StringIndexer};

/// A read-through cache in front of another [`StringIndexer`].
///
/// Both directions are cached in bounded LRU caches. Since mappings never change once recorded,
/// cached entries never become stale. Errors are not cached, so a transient storage failure or an
/// unbound id is retried against the inner indexer on the next call.
pub struct CachingIndexer<I> {
    inner: I,
    ids: Mutex<LruCache<IdKey, u64>>,
    strings: Mutex<LruCache<(IndexScope, u64), Arc<str>>>,
}

impl<I> CachingIndexer<I> {
    /// Wraps `inner` with caches holding up to `capacity` entries per direction.
    pub fn new(inner: I, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            ids: Mutex::new(LruCache::new(capacity)),
            strings: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the wrapped indexer.
    pub fn inner(&self) -> &I {
        &self.inner
    }

    fn cached_id(&self, scope: IndexScope, string: &str) -> Option<u64> {
        let key = (scope, string);
        let id = self.ids.lock().get(&key as &dyn AsIdKey).copied();
        count_cache(id.is_some(), "record");
        id
    }

    fn cached_string(&self, scope: IndexScope, id: u64) -> Option<String> {
        let string = self.strings.lock().get(&(scope, id)).map(|s| s.to_string());
        count_cache(string.is_some(), "resolve");
        string
    }

    fn insert(&self, scope: IndexScope, string: &str, id: u64) {
        let string: Arc<str> = Arc::from(string);
        self.strings.lock().put((scope, id), string.clone());
        self.ids.lock().put(IdKey { scope, string }, id);
    }
}

/// Key of the id cache.
///
/// Lookups borrow it as `dyn AsIdKey`, so probing the cache with a `&str` does not allocate.
#[derive(Debug)]
struct IdKey {
    scope: IndexScope,
    string: Arc<str>,
}

trait AsIdKey {
    fn as_id_key(&self) -> (IndexScope, &str);
}

impl AsIdKey for IdKey {
    fn as_id_key(&self) -> (IndexScope, &str) {
        (self.scope, &*self.string)
    }
}

impl AsIdKey for (IndexScope, &str) {
    fn as_id_key(&self) -> (IndexScope, &str) {
        *self
    }
}

impl<'a> Borrow<dyn AsIdKey + 'a> for IdKey {
    fn borrow(&self) -> &(dyn AsIdKey + 'a) {
        self
    }
}

impl Hash for dyn AsIdKey + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_id_key().hash(state);
    }
}

impl PartialEq for dyn AsIdKey + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.as_id_key() == other.as_id_key()
    }
}

impl Eq for dyn AsIdKey + '_ {}

impl Hash for IdKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_id_key().hash(state);
    }
}

impl PartialEq for IdKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_id_key() == other.as_id_key()
    }
}

impl Eq for IdKey {}

fn count_cache(hit: bool, direction: &'static str) {
    if hit {
        metric!(counter(IndexerCounters::CacheHit) += 1, direction = direction);
    } else {
        metric!(counter(IndexerCounters::CacheMiss) += 1, direction = direction);
    }
}

impl<I: fmt::Debug> fmt::Debug for CachingIndexer<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingIndexer")
            .field("inner", &self.inner)
            .field("cached_ids", &self.ids.lock().len())
            .field("cached_strings", &self.strings.lock().len())
            .finish()
    }
}

#[async_trait]
impl<I: StringIndexer> StringIndexer for CachingIndexer<I> {
    async fn record(&self, scope: IndexScope, string: &str) -> Result<u64, IndexerError> {
        if let Some(id) = self.cached_id(scope, string) {
            return Ok(id);
        }

        let id = self.inner.record(scope, string).await?;
        self.insert(scope, string, id);
        Ok(id)
    }

    async fn resolve(&self, scope: IndexScope, id: u64) -> Result<String, IndexerError> {
        if let Some(string) = self.cached_string(scope, id) {
            return Ok(string);
        }

        let string = self.inner.resolve(scope, id).await?;
        self.insert(scope, &string, id);
        Ok(string)
    }

    async fn bulk_resolve(
        &self,
        scope: IndexScope,
        ids: &[u64],
    ) -> Result<Vec<String>, IndexerError> {
        let mut strings: Vec<Option<String>> =
            ids.iter().map(|&id| self.cached_string(scope, id)).collect();

        let missing: Vec<u64> = ids
            .iter()
            .zip(&strings)
            .filter(|(_, string)| string.is_none())
            .map(|(&id, _)| id)
            .collect();

        if !missing.is_empty() {
            let resolved = self.inner.bulk_resolve(scope, &missing).await?;
            let mut resolved = missing.iter().zip(resolved);

            for slot in strings.iter_mut().filter(|s| s.is_none()) {
                if let Some((&id, string)) = resolved.next() {
                    self.insert(scope, &string, id);
                    *slot = Some(string);
                }
            }
        }

        Ok(strings.into_iter().flatten().collect())
    }

    async fn lookup(&self, scope: IndexScope, string: &str) -> Result<Option<u64>, IndexerError> {
        if let Some(id) = self.cached_id(scope, string) {
            return Ok(Some(id));
        }

        let id = self.inner.lookup(scope, string).await?;
        if let Some(id) = id {
            self.insert(scope, string, id);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sieve_base_schema::metrics::UseCaseId;
    use sieve_base_schema::organization::OrganizationId;

    use crate::MemoryIndexer;

    use super::*;

    /// Counts calls that reach the backing indexer.
    #[derive(Debug, Default)]
    struct CountingIndexer {
        inner: MemoryIndexer,
        calls: AtomicUsize,
    }

    impl CountingIndexer {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl StringIndexer for CountingIndexer {
        async fn record(&self, scope: IndexScope, string: &str) -> Result<u64, IndexerError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.record(scope, string).await
        }

        async fn resolve(&self, scope: IndexScope, id: u64) -> Result<String, IndexerError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.resolve(scope, id).await
        }

        async fn lookup(
            &self,
            scope: IndexScope,
            string: &str,
        ) -> Result<Option<u64>, IndexerError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.lookup(scope, string).await
        }
    }

    fn scope() -> IndexScope {
        IndexScope::new(UseCaseId::Custom, OrganizationId::new(1))
    }

    fn indexer(capacity: usize) -> CachingIndexer<CountingIndexer> {
        CachingIndexer::new(
            CountingIndexer::default(),
            NonZeroUsize::new(capacity).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_record_populates_both_directions() {
        let indexer = indexer(10);

        let id = indexer.record(scope(), "release").await.unwrap();
        assert_eq!(indexer.record(scope(), "release").await.unwrap(), id);
        assert_eq!(indexer.resolve(scope(), id).await.unwrap(), "release");
        assert_eq!(indexer.lookup(scope(), "release").await.unwrap(), Some(id));

        assert_eq!(indexer.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_ids_are_scoped() {
        let indexer = indexer(10);
        let other = IndexScope::new(UseCaseId::Spans, OrganizationId::new(1));

        let id = indexer.record(scope(), "release").await.unwrap();
        assert_eq!(indexer.lookup(other, "release").await.unwrap(), None);
        assert_eq!(indexer.lookup(scope(), "release").await.unwrap(), Some(id));

        // The miss in the other scope reached the inner indexer, the hit did not.
        assert_eq!(indexer.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let indexer = indexer(10);

        assert!(indexer.resolve(scope(), 1).await.is_err());
        let id = indexer.inner().inner.record(scope(), "release").await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(indexer.resolve(scope(), 1).await.unwrap(), "release");

        assert_eq!(indexer.lookup(scope(), "other").await.unwrap(), None);
        assert_eq!(indexer.lookup(scope(), "other").await.unwrap(), None);
        assert_eq!(indexer.inner().calls(), 4);
    }

    #[tokio::test]
    async fn test_eviction() {
        let indexer = indexer(1);

        let a = indexer.record(scope(), "a").await.unwrap();
        indexer.record(scope(), "b").await.unwrap();
        assert_eq!(indexer.resolve(scope(), a).await.unwrap(), "a");

        assert_eq!(indexer.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_bulk_resolve_mixes_cached_and_missing() {
        let indexer = indexer(10);

        let a = indexer.record(scope(), "a").await.unwrap();
        let b = indexer.inner().inner.record(scope(), "b").await.unwrap();

        let strings = indexer.bulk_resolve(scope(), &[b, a, b]).await.unwrap();
        assert_eq!(strings, ["b", "a", "b"]);
        assert_eq!(indexer.resolve(scope(), b).await.unwrap(), "b");

        // One record plus the two misses for `b` in the bulk call.
        assert_eq!(indexer.inner().calls(), 3);
    }

    #[test]
    fn test_cache_counters() {
        let indexer = indexer(10);
        let id = futures::executor::block_on(indexer.record(scope(), "a")).unwrap();

        let captures = sieve_statsd::with_capturing_test_client(|| {
            futures::executor::block_on(indexer.resolve(scope(), id)).unwrap();
        });

        assert_eq!(captures, ["indexer.cache.hit:1|c|#direction:resolve"]);
    }
}
