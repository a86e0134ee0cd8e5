use sieve_statsd::CounterMetric;

/// Counter metrics for the string indexer.
pub enum IndexerCounters {
    /// Incremented for every new id handed out.
    ///
    /// This metric is tagged with:
    ///  - `use_case`: The use case of the indexed string.
    Allocated,
    /// Incremented for every lookup served from the cache.
    ///
    /// This metric is tagged with:
    ///  - `direction`: `record` or `resolve`.
    CacheHit,
    /// Incremented for every lookup forwarded to the backing indexer.
    ///
    /// This metric is tagged with:
    ///  - `direction`: `record` or `resolve`.
    CacheMiss,
    /// Incremented whenever a concurrent writer recorded the same string first.
    #[cfg(feature = "redis")]
    RecordRace,
}

impl CounterMetric for IndexerCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::Allocated => "indexer.allocated",
            Self::CacheHit => "indexer.cache.hit",
            Self::CacheMiss => "indexer.cache.miss",
            #[cfg(feature = "redis")]
            Self::RecordRace => "indexer.record.race",
        }
    }
}
