//! Error types for the expirykit library.
//!
//! ## Key Components
//!
//! - [`TimingWheelError`]: Returned by [`TimingWheel`](crate::timer::TimingWheel)
//!   operations when the wheel has been stopped or an argument is invalid.
//! - [`CacheError`]: Returned by [`Cache`](crate::cache::Cache) construction and
//!   by [`Cache::take`](crate::cache::Cache::take) when the fetch fails.
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (debug-only `check_invariants` methods).
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use expirykit::error::TimingWheelError;
//! use expirykit::timer::TimingWheel;
//!
//! let err = TimingWheel::<u64, ()>::new(Duration::ZERO, 8, |_, _| {}).unwrap_err();
//! assert_eq!(err, TimingWheelError::Argument);
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// TimingWheelError
// ---------------------------------------------------------------------------

/// Error returned by timing wheel construction and timer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimingWheelError {
    /// The wheel has been stopped; no further operations are accepted.
    #[error("timing wheel is closed already")]
    Closed,
    /// A zero interval, zero slot count or zero delay was supplied.
    #[error("incorrect task argument")]
    Argument,
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Shared, type-erased error produced by a [`Cache::take`](crate::cache::Cache::take) fetch.
pub type FetchError = Arc<dyn Error + Send + Sync>;

/// Error returned by cache construction and cache-aside loading.
///
/// `Clone` so that one fetch failure can be handed to every coalesced caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The internal timing wheel could not be built or has been stopped.
    #[error(transparent)]
    TimingWheel(#[from] TimingWheelError),
    /// The fetch function passed to `take` failed.
    #[error("fetch failed: {0}")]
    Fetch(#[source] FetchError),
}

impl CacheError {
    /// Wraps a fetch error so it can be shared between coalesced callers.
    pub fn fetch<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        CacheError::Fetch(Arc::from(err.into()))
    }

    /// Returns the underlying fetch error, if this is a fetch failure.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            CacheError::Fetch(err) => Some(err),
            CacheError::TimingWheel(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal invariants are violated.
///
/// Produced by debug-only `check_invariants` methods
/// (e.g. [`LeakSafeMap::check_invariants`](crate::ds::LeakSafeMap::check_invariants)).
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for InvariantError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
