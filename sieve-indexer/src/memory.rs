use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;
use sieve_statsd::metric;

use crate::statsd::IndexerCounters;
use crate::{IndexScope, IndexerError, StringIndexer};

/// Bidirectional table of a single scope.
#[derive(Debug, Default)]
struct ScopeTable {
    by_string: HashMap<Arc<str>, u64>,
    by_id: HashMap<u64, Arc<str>>,
}

type SharedTable = Arc<RwLock<ScopeTable>>;

/// An in-process [`StringIndexer`].
///
/// Every scope has its own table behind a read-write lock, so concurrent writers in different
/// scopes never contend. Ids are drawn from a single sequence shared by all scopes and start at
/// `1`.
#[derive(Default)]
pub struct MemoryIndexer {
    next_id: AtomicU64,
    scopes: papaya::HashMap<IndexScope, SharedTable>,
}

impl MemoryIndexer {
    /// Creates an empty indexer.
    pub fn new() -> Self {
        Self::default()
    }

    fn get_table(&self, scope: IndexScope) -> Option<SharedTable> {
        self.scopes.pin().get(&scope).cloned()
    }

    fn get_or_create_table(&self, scope: IndexScope) -> SharedTable {
        // The fast path, we expect the scope to exist.
        let scopes = self.scopes.pin();
        if let Some(table) = scopes.get(&scope) {
            return table.clone();
        }

        // Somebody else may have been faster, in which case their table wins.
        match scopes.try_insert(scope, SharedTable::default()) {
            Ok(inserted) => inserted.clone(),
            Err(occupied) => occupied.current.clone(),
        }
    }

    fn record_sync(&self, scope: IndexScope, string: &str) -> u64 {
        let table = self.get_or_create_table(scope);

        if let Some(&id) = table.read().by_string.get(string) {
            return id;
        }

        let mut table = table.write();
        // Check again, another writer may have won the race for the write lock.
        if let Some(&id) = table.by_string.get(string) {
            return id;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let string: Arc<str> = Arc::from(string);
        table.by_id.insert(id, string.clone());
        table.by_string.insert(string, id);

        metric!(
            counter(IndexerCounters::Allocated) += 1,
            use_case = scope.use_case.as_str()
        );

        id
    }

    fn resolve_sync(&self, scope: IndexScope, id: u64) -> Result<String, IndexerError> {
        self.get_table(scope)
            .and_then(|table| table.read().by_id.get(&id).map(|s| s.to_string()))
            .ok_or(IndexerError::Unbound { scope, id })
    }

    fn lookup_sync(&self, scope: IndexScope, string: &str) -> Option<u64> {
        let table = self.get_table(scope)?;
        table.read().by_string.get(string).copied()
    }
}

impl fmt::Debug for MemoryIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIndexer")
            .field("num_scopes", &self.scopes.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[async_trait]
impl StringIndexer for MemoryIndexer {
    async fn record(&self, scope: IndexScope, string: &str) -> Result<u64, IndexerError> {
        Ok(self.record_sync(scope, string))
    }

    async fn resolve(&self, scope: IndexScope, id: u64) -> Result<String, IndexerError> {
        self.resolve_sync(scope, id)
    }

    async fn lookup(&self, scope: IndexScope, string: &str) -> Result<Option<u64>, IndexerError> {
        Ok(self.lookup_sync(scope, string))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use sieve_base_schema::metrics::UseCaseId;
    use sieve_base_schema::organization::OrganizationId;

    use super::*;

    fn scope(use_case: UseCaseId, org: u64) -> IndexScope {
        IndexScope::new(use_case, OrganizationId::new(org))
    }

    #[tokio::test]
    async fn test_record_idempotent() {
        let indexer = MemoryIndexer::new();
        let scope = scope(UseCaseId::Custom, 1);

        let first = indexer.record(scope, "c:custom/clicks@none").await.unwrap();
        let second = indexer.record(scope, "c:custom/clicks@none").await.unwrap();
        let other = indexer.record(scope, "s:custom/user@none").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(
            indexer.resolve(scope, first).await.unwrap(),
            "c:custom/clicks@none"
        );
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let indexer = MemoryIndexer::new();
        let org1 = scope(UseCaseId::Custom, 1);
        let org2 = scope(UseCaseId::Custom, 2);
        let spans = scope(UseCaseId::Spans, 1);

        let id1 = indexer.record(org1, "release").await.unwrap();
        let id2 = indexer.record(org2, "release").await.unwrap();
        let id3 = indexer.record(spans, "release").await.unwrap();

        assert_eq!(BTreeSet::from([id1, id2, id3]).len(), 3);
        assert!(matches!(
            indexer.resolve(org2, id1).await,
            Err(IndexerError::Unbound { id, .. }) if id == id1
        ));
    }

    #[tokio::test]
    async fn test_resolve_unbound() {
        let indexer = MemoryIndexer::new();
        let error = indexer
            .resolve(scope(UseCaseId::Sessions, 7), 42)
            .await
            .unwrap_err();

        assert!(error.is_integrity());
        assert_eq!(
            error.to_string(),
            "no string bound to id 42 in scope sessions:7"
        );
    }

    #[tokio::test]
    async fn test_lookup_does_not_allocate() {
        let indexer = MemoryIndexer::new();
        let scope = scope(UseCaseId::Custom, 1);

        assert_eq!(indexer.lookup(scope, "environment").await.unwrap(), None);
        let id = indexer.record(scope, "environment").await.unwrap();
        assert_eq!(indexer.lookup(scope, "environment").await.unwrap(), Some(id));
        assert_eq!(indexer.record(scope, "other").await.unwrap(), id + 1);
    }

    #[tokio::test]
    async fn test_bulk() {
        let indexer = MemoryIndexer::new();
        let scope = scope(UseCaseId::Transactions, 3);

        let ids = indexer
            .bulk_record(scope, &["a", "b", "a"])
            .await
            .unwrap();
        assert_eq!(ids[0], ids[2]);

        let strings = indexer.bulk_resolve(scope, &ids).await.unwrap();
        assert_eq!(strings, ["a", "b", "a"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_record_converges() {
        let indexer = Arc::new(MemoryIndexer::new());
        let scope = scope(UseCaseId::Custom, 1);

        let tasks = (0..32).map(|_| {
            let indexer = Arc::clone(&indexer);
            tokio::spawn(async move { indexer.record(scope, "d:custom/page_load@millisecond").await })
        });

        let ids: BTreeSet<u64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|result| result.unwrap().unwrap())
            .collect();

        assert_eq!(ids.len(), 1);
    }
}
