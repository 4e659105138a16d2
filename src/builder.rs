//! Builder for [`Cache`] instances.
//!
//! Every option has a default, so `CacheBuilder::new(expire).build()` is
//! equivalent to [`Cache::new`].
//!
//! | Option          | Default                | Effect                                   |
//! |-----------------|------------------------|------------------------------------------|
//! | `limit`         | `0` (unbounded)        | Max entries; LRU eviction beyond it      |
//! | `name`          | `"proc"`               | Label used in stat reports               |
//! | `stat_interval` | one minute             | Period of the stats reporter             |
//! | `stats_sink`    | [`TracingStatsSink`]   | Destination of stat reports              |
//! | `ticker`        | wall clock, 1s ticks   | Tick source of the expiry wheel          |
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use expirykit::builder::CacheBuilder;
//!
//! let cache = CacheBuilder::new(Duration::from_secs(60))
//!     .limit(1_000)
//!     .name("users")
//!     .build::<u64, String>()
//!     .unwrap();
//! cache.set(1, "alice".to_string());
//! assert_eq!(cache.get(&1), Some("alice".to_string()));
//! ```

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::metrics::{STAT_INTERVAL, StatsSink, TracingStatsSink};
use crate::timer::Ticker;

/// Name used when none is configured.
pub const DEFAULT_NAME: &str = "proc";

/// Configures and builds a [`Cache`].
pub struct CacheBuilder {
    pub(crate) expire: Duration,
    pub(crate) limit: usize,
    pub(crate) name: String,
    pub(crate) stat_interval: Duration,
    pub(crate) sink: Arc<dyn StatsSink>,
    pub(crate) ticker: Option<Box<dyn Ticker>>,
}

impl CacheBuilder {
    /// Starts a builder for entries living `expire` by default.
    pub fn new(expire: Duration) -> Self {
        Self {
            expire,
            limit: 0,
            name: DEFAULT_NAME.to_string(),
            stat_interval: STAT_INTERVAL,
            sink: Arc::new(TracingStatsSink),
            ticker: None,
        }
    }

    /// Caps the number of entries; `0` leaves the cache unbounded.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn stat_interval(mut self, interval: Duration) -> Self {
        self.stat_interval = interval;
        self
    }

    pub fn stats_sink<S: StatsSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Drives expiry from `ticker` instead of the wall clock.
    ///
    /// Each tick still stands for one second of TTL.
    pub fn ticker<T: Ticker>(mut self, ticker: T) -> Self {
        self.ticker = Some(Box::new(ticker));
        self
    }

    /// Builds the cache, starting its expiry wheel and stats reporter.
    pub fn build<K, V>(self) -> Result<Cache<K, V>, CacheError>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        Cache::from_builder(self)
    }
}

impl std::fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("expire", &self.expire)
            .field("limit", &self.limit)
            .field("name", &self.name)
            .field("stat_interval", &self.stat_interval)
            .field("custom_ticker", &self.ticker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = CacheBuilder::new(Duration::from_secs(5));
        assert_eq!(builder.expire, Duration::from_secs(5));
        assert_eq!(builder.limit, 0);
        assert_eq!(builder.name, DEFAULT_NAME);
        assert_eq!(builder.stat_interval, STAT_INTERVAL);
        assert!(builder.ticker.is_none());
    }

    #[test]
    fn options_are_applied() {
        let cache = CacheBuilder::new(Duration::from_secs(5))
            .limit(2)
            .name("sessions")
            .build::<u64, u64>()
            .unwrap();
        assert_eq!(cache.name(), "sessions");
        assert_eq!(cache.limit(), Some(2));

        cache.set(1, 1);
        cache.set(2, 2);
        cache.set(3, 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn zero_limit_is_unbounded() {
        let cache = CacheBuilder::new(Duration::from_secs(5))
            .build::<u64, u64>()
            .unwrap();
        assert_eq!(cache.limit(), None);
        for i in 0..500 {
            cache.set(i, i);
        }
        assert_eq!(cache.len(), 500);
    }
}
