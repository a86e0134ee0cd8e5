use sieve_indexer::IndexerError;
use sieve_visibility::BlockStoreError;

/// An error returned by a [`MetricsStorage`](crate::MetricsStorage).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The string indexer returned inconsistent bindings for strings of an observation.
    #[error("metrics index is inconsistent")]
    Integrity(#[source] IndexerError),

    /// Strings of an observation could not be indexed.
    #[error("failed to index metric strings")]
    Indexer(#[source] IndexerError),
}

impl StorageError {
    /// Returns `true` if the error indicates inconsistent data rather than a failing backend.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

impl From<IndexerError> for StorageError {
    fn from(error: IndexerError) -> Self {
        if error.is_integrity() {
            Self::Integrity(error)
        } else {
            Self::Indexer(error)
        }
    }
}

/// An error returned by the [`MetricsCatalog`](crate::MetricsCatalog).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// An id from storage has no string bound to it in the indexer.
    #[error("metrics index is inconsistent")]
    Integrity(#[source] IndexerError),

    /// The string indexer is unavailable.
    #[error("failed to access the string indexer")]
    Indexer(#[source] IndexerError),

    /// The block store is unavailable.
    #[error("failed to load blocked metrics")]
    BlockStore(#[from] BlockStoreError),

    /// The metric storage is unavailable.
    #[error("failed to access metric storage")]
    Storage(#[source] StorageError),

    /// The metric has not been observed in any of the requested projects.
    #[error("metric {0} was not found")]
    UnknownMetric(String),

    /// The tag is not visible in any of the requested projects.
    #[error("tag {0} was not found")]
    UnknownTag(String),
}

impl CatalogError {
    /// Returns `true` if a backing service failed and the request may succeed later.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Indexer(_) | Self::BlockStore(_) | Self::Storage(_)
        )
    }
}

impl From<IndexerError> for CatalogError {
    fn from(error: IndexerError) -> Self {
        if error.is_integrity() {
            Self::Integrity(error)
        } else {
            Self::Indexer(error)
        }
    }
}

impl From<StorageError> for CatalogError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Integrity(error) => Self::Integrity(error),
            error => Self::Storage(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use sieve_base_schema::metrics::UseCaseId;
    use sieve_base_schema::organization::OrganizationId;
    use sieve_indexer::IndexScope;

    use super::*;

    fn unbound() -> IndexerError {
        IndexerError::Unbound {
            scope: IndexScope::new(UseCaseId::Custom, OrganizationId::new(1)),
            id: 42,
        }
    }

    #[test]
    fn test_storage_integrity() {
        let error = StorageError::from(unbound());
        assert!(error.is_integrity());

        let error = CatalogError::from(error);
        assert!(matches!(error, CatalogError::Integrity(_)), "{error:?}");
        assert!(!error.is_unavailable());
    }
}
