pub use crate::builder::CacheBuilder;
pub use crate::cache::Cache;
pub use crate::ds::{ConcurrentLeakSafeMap, IntrusiveList, LeakSafeMap, SlotArena, SlotId};
pub use crate::error::{CacheError, InvariantError, TimingWheelError};
pub use crate::jitter::Unstable;
pub use crate::metrics::{CacheStatReport, StatsSink, TracingStatsSink};
pub use crate::policy::{BoundedIndex, RecencyIndex, UnboundedIndex};
pub use crate::sync::{SingleFlight, TaskRunner};
pub use crate::timer::{IntervalTicker, ManualTicker, ManualTickerHandle, Ticker, TimingWheel};
