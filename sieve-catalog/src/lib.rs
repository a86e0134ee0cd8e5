//! The catalog of metrics observed in a set of projects.
//!
//! The catalog combines three sources:
//!
//!  - a [`MetricsStorage`] which knows, as indexed ids, which metrics and tags have been observed
//!    in which project,
//!  - a [`StringIndexer`](sieve_indexer::StringIndexer) to resolve those ids back to strings,
//!  - a [`MetricBlockStore`](sieve_visibility::MetricBlockStore) with the blocking state of each
//!    project.
//!
//! Blocking never hides a metric from [`MetricsCatalog::list_metrics`], it only annotates the
//! entry. Tag enumeration, however, only returns tags visible in at least one project.

#![warn(missing_docs)]

mod catalog;
mod error;
mod memory;
mod statsd;
mod storage;

pub use self::catalog::*;
pub use self::error::*;
pub use self::memory::MemoryMetricsStorage;
pub use self::storage::*;
