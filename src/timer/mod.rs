//! Hashed timing wheel and the tick sources that drive it.

pub mod ticker;
pub mod wheel;

pub use ticker::{IntervalTicker, ManualTicker, ManualTickerHandle, Ticker};
pub use wheel::{DRAIN_WORKERS, TimingWheel};
