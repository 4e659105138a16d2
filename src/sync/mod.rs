//! Concurrency helpers shared by the timing wheel and the cache.

pub mod runner;
pub mod single_flight;

pub use runner::{TaskRunner, run_safe, spawn_safe};
pub use single_flight::SingleFlight;
