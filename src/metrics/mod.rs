//! Cache hit/miss statistics and their periodic publication.

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use exporter::TracingStatsSink;
pub use metrics_impl::{CacheStat, STAT_INTERVAL, StatReporter};
pub use snapshot::CacheStatReport;
pub use traits::StatsSink;
