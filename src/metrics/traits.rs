//! # Stats Consumption
//!
//! Recording and publishing are split: the cache only bumps atomic counters
//! in [`CacheStat`](crate::metrics::CacheStat); a reporter thread swaps them
//! out once per interval and hands the resulting
//! [`CacheStatReport`] to a [`StatsSink`].
//!
//! ```text
//!   Cache::get / take ──► CacheStat { hit, miss }  (AtomicU64)
//!                                   │
//!                          every stat interval
//!                                   ▼
//!                    StatReporter ──► StatsSink::stat(name, report)
//!                                        │
//!                                        ├─ TracingStatsSink (default)
//!                                        └─ user sinks
//! ```

use std::sync::Arc;

use crate::metrics::snapshot::CacheStatReport;

/// Receives one report per non-idle interval.
pub trait StatsSink: Send + Sync {
    fn stat(&self, name: &str, report: &CacheStatReport);
}

impl<S: StatsSink + ?Sized> StatsSink for Arc<S> {
    fn stat(&self, name: &str, report: &CacheStatReport) {
        (**self).stat(name, report)
    }
}

impl<S: StatsSink + ?Sized> StatsSink for Box<S> {
    fn stat(&self, name: &str, report: &CacheStatReport) {
        (**self).stat(name, report)
    }
}
