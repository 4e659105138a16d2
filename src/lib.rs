//! expirykit: timing-wheel driven TTL expiry for in-process caches.
//!
//! - [`timer::TimingWheel`]: hashed timing wheel owned by a single worker
//!   thread; schedules, moves, cancels and drains keyed timers.
//! - [`ds::LeakSafeMap`]: two-generation map that sheds the memory of deleted
//!   entries once enough deletions pile up.
//! - [`policy::BoundedIndex`]: LRU key index with a synchronous eviction
//!   callback.
//! - [`cache::Cache`]: thread-safe TTL cache combining the three, with
//!   coalesced loading through [`sync::SingleFlight`] and periodic hit/miss
//!   reporting.
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod builder;
pub mod cache;
pub mod ds;
pub mod error;
pub mod jitter;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod sync;
pub mod timer;
