use sieve_statsd::{CounterMetric, TimerMetric};

/// Counter metrics for the block store.
pub enum BlockStoreCounters {
    /// Incremented for every operation applied to a project.
    ///
    /// This metric is tagged with:
    ///  - `operation`: The name of the operation, for example `blockTags`.
    Operation,
    /// Incremented for every project state loaded from Redis.
    #[cfg(feature = "redis")]
    RedisRead,
}

impl CounterMetric for BlockStoreCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::Operation => "visibility.operation",
            #[cfg(feature = "redis")]
            Self::RedisRead => "visibility.redis.read",
        }
    }
}

/// Timer metrics for the block store.
pub enum BlockStoreTimers {
    /// Time spent loading the state of projects.
    ///
    /// This metric is tagged with:
    ///  - `store`: `memory` or `redis`.
    GetBlockedMetrics,
}

impl TimerMetric for BlockStoreTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::GetBlockedMetrics => "visibility.get_blocked_metrics.duration",
        }
    }
}
