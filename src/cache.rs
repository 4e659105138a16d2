//! # TTL Cache
//!
//! Thread-safe key/value cache where every entry expires after a jittered
//! TTL and, optionally, the least recently used entries are evicted once a
//! size limit is reached.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ Cache<K, V>                                                          │
//!   │                                                                      │
//!   │   Mutex<CacheCore> ─────────────┐     TimingWheel<K, ()>             │
//!   │   ┌──────────────────────────┐  │     1s ticks, 300 slots            │
//!   │   │ data:  FxHashMap<K, V>   │  │          │                         │
//!   │   │ index: dyn RecencyIndex  │  │◄─ Weak ──┘ expiry callback         │
//!   │   └──────────────────────────┘  │                                    │
//!   │                                                                      │
//!   │   SingleFlight<K, Result<V>>   coalesces concurrent `take` misses    │
//!   │   Unstable(0.05)               ±5% TTL jitter                        │
//!   │   CacheStat + StatReporter     hit/miss counters, periodic report    │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! `data` and the recency index share one lock. A key evicted by the index
//! has its timer cancelled before the lock is released, so a later write of
//! the same key always schedules against a wheel without the stale entry.
//! The wheel worker never takes the cache lock: the expiry callback runs on
//! a wheel executor thread, so waiting on the worker while locked is safe.
//! Timers of the written key itself are set or moved after unlocking.
//!
//! ## Stats
//!
//! `get` counts a hit or a miss. `take` counts a hit when the value was
//! already cached or produced by another caller's fetch, and a miss only for
//! the caller whose fetch actually ran. A failed fetch counts nothing.

use std::error::Error;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::builder::CacheBuilder;
use crate::error::{CacheError, TimingWheelError};
use crate::jitter::Unstable;
use crate::metrics::{CacheStat, CacheStatReport, StatReporter};
use crate::policy::{BoundedIndex, RecencyIndex, UnboundedIndex};
use crate::sync::SingleFlight;
use crate::timer::TimingWheel;

/// Tick length of the expiry wheel.
pub const WHEEL_INTERVAL: Duration = Duration::from_secs(1);
/// Slot count of the expiry wheel; TTLs up to five minutes need no circles.
pub const WHEEL_SLOTS: usize = 300;
/// Relative TTL deviation applied on every write.
pub const EXPIRY_DEVIATION: f64 = 0.05;

struct CacheCore<K, V> {
    data: FxHashMap<K, V>,
    index: Box<dyn RecencyIndex<K> + Send>,
}

impl<K, V> CacheCore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn lookup(&mut self, key: &K) -> Option<V> {
        let value = self.data.get(key).cloned()?;
        // touching an existing key never evicts
        self.index.add(key.clone(), &mut |_| {});
        Some(value)
    }

    /// Stores `value`, returning whether `key` was already present. Keys
    /// evicted to make room are dropped from `data` and handed to
    /// `on_evict` while the caller still holds the lock.
    fn store(&mut self, key: K, value: V, on_evict: &mut dyn FnMut(K)) -> bool {
        let existed = self.data.insert(key.clone(), value).is_some();
        let CacheCore { data, index } = self;
        index.add(key, &mut |old| {
            data.remove(&old);
            on_evict(old);
        });
        existed
    }

    fn forget(&mut self, key: &K) {
        self.data.remove(key);
        self.index.remove(key, &mut |_| {});
    }
}

/// TTL cache with optional LRU bound and coalesced loading.
///
/// Dropping the cache stops its expiry wheel and stats reporter.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use expirykit::cache::Cache;
///
/// let cache: Cache<String, u32> = Cache::new(Duration::from_secs(60)).unwrap();
/// cache.set("a".to_string(), 1);
/// assert_eq!(cache.get(&"a".to_string()), Some(1));
///
/// let loaded = cache
///     .take("b".to_string(), || Ok::<_, std::io::Error>(2))
///     .unwrap();
/// assert_eq!(loaded, 2);
/// assert_eq!(cache.len(), 2);
/// ```
pub struct Cache<K, V> {
    name: String,
    expire: Duration,
    limit: Option<usize>,
    core: Arc<Mutex<CacheCore<K, V>>>,
    timing_wheel: TimingWheel<K, ()>,
    unstable_expiry: Unstable,
    barrier: SingleFlight<K, Result<V, CacheError>>,
    stats: Arc<CacheStat>,
    _reporter: StatReporter,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Creates an unbounded cache whose entries live `expire` by default.
    pub fn new(expire: Duration) -> Result<Self, CacheError> {
        CacheBuilder::new(expire).build()
    }

    pub(crate) fn from_builder(builder: CacheBuilder) -> Result<Self, CacheError> {
        let CacheBuilder {
            expire,
            limit,
            name,
            stat_interval,
            sink,
            ticker,
        } = builder;

        let index: Box<dyn RecencyIndex<K> + Send> = if limit > 0 {
            Box::new(BoundedIndex::new(limit))
        } else {
            Box::new(UnboundedIndex)
        };
        let core = Arc::new(Mutex::new(CacheCore {
            data: FxHashMap::default(),
            index,
        }));

        let on_expire = expire_callback(Arc::downgrade(&core));
        let timing_wheel = match ticker {
            Some(ticker) => TimingWheel::with_ticker(WHEEL_INTERVAL, WHEEL_SLOTS, on_expire, ticker)?,
            None => TimingWheel::new(WHEEL_INTERVAL, WHEEL_SLOTS, on_expire)?,
        };

        let stats = Arc::new(CacheStat::new());
        let reporter = {
            let core = Arc::downgrade(&core);
            StatReporter::spawn(
                name.clone(),
                Arc::clone(&stats),
                stat_interval,
                move || core.upgrade().map(|core| core.lock().data.len()),
                sink,
            )
        };

        tracing::debug!(cache = %name, ?expire, limit, "cache created");
        Ok(Self {
            name,
            expire,
            limit: (limit > 0).then_some(limit),
            core,
            timing_wheel,
            unstable_expiry: Unstable::new(EXPIRY_DEVIATION),
            barrier: SingleFlight::new(),
            stats,
            _reporter: reporter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default TTL used by [`set`](Self::set).
    pub fn expire(&self) -> Duration {
        self.expire
    }

    /// Configured entry limit, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.core.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters of the current stats interval.
    pub fn stats(&self) -> CacheStatReport {
        self.stats.snapshot(self.len())
    }

    /// Returns a clone of the value for `key`, marking it recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.core.lock().lookup(key);
        match value {
            Some(_) => self.stats.increment_hit(),
            None => self.stats.increment_miss(),
        }
        value
    }

    /// Stores `value` with the default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_expire(key, value, self.expire);
    }

    /// Stores `value`, expiring it after roughly `expire`.
    ///
    /// The TTL is jittered by ±5%. Overwriting a key reschedules its expiry.
    pub fn set_with_expire(&self, key: K, value: V, expire: Duration) {
        let existed = {
            let mut core = self.core.lock();
            core.store(key.clone(), value, &mut |old| self.cancel_evicted(old))
        };

        let ttl = self.unstable_expiry.around_duration(expire);
        // a zero TTL expires on the next tick
        let ttl = ttl.max(Duration::from_nanos(1));
        if existed {
            self.wheel_result("move_timer", self.timing_wheel.move_timer(key, ttl));
        } else {
            self.wheel_result("set_timer", self.timing_wheel.set_timer(key, (), ttl));
        }
    }

    /// Removes `key` and cancels its expiry.
    pub fn del(&self, key: &K) {
        self.core.lock().forget(key);
        self.wheel_result("remove_timer", self.timing_wheel.remove_timer(key.clone()));
    }

    /// Returns the cached value for `key`, loading it with `fetch` on a miss.
    ///
    /// Concurrent misses on the same key run `fetch` once; every waiting
    /// caller receives the same value or the same error. A fetched value is
    /// stored with the default TTL.
    pub fn take<F, E>(&self, key: K, fetch: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Result<V, E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        if let Some(value) = self.core.lock().lookup(&key) {
            self.stats.increment_hit();
            return Ok(value);
        }

        let mut fresh = false;
        let result = self.barrier.do_call(key.clone(), || {
            if let Some(value) = self.core.lock().lookup(&key) {
                return Ok(value);
            }
            let value = fetch().map_err(CacheError::fetch)?;
            fresh = true;
            self.set(key.clone(), value.clone());
            Ok(value)
        });
        let value = result?;

        if fresh {
            self.stats.increment_miss();
        } else {
            self.stats.increment_hit();
        }
        Ok(value)
    }

    fn cancel_evicted(&self, old: K) {
        self.wheel_result("remove_timer", self.timing_wheel.remove_timer(old));
    }

    fn wheel_result(&self, op: &'static str, result: Result<(), TimingWheelError>) {
        if let Err(err) = result {
            tracing::warn!(cache = %self.name, op, error = %err, "timing wheel rejected operation");
        }
    }
}

fn expire_callback<K, V>(core: Weak<Mutex<CacheCore<K, V>>>) -> impl Fn(K, ()) + Send + Sync + 'static
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    move |key: K, _: ()| {
        if let Some(core) = core.upgrade() {
            core.lock().forget(&key);
        }
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("expire", &self.expire)
            .field("limit", &self.limit)
            .field("timing_wheel", &self.timing_wheel)
            .finish_non_exhaustive()
    }
}
