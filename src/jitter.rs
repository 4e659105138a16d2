//! Randomised deviation around a base value.
//!
//! The cache stretches or shrinks each TTL by up to ±5% so that entries
//! written together do not all expire on the same tick.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces values uniformly distributed in `[base * (1 - d), base * (1 + d)]`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use expirykit::jitter::Unstable;
///
/// let unstable = Unstable::new(0.05);
/// let ttl = unstable.around_duration(Duration::from_secs(100));
/// assert!(ttl >= Duration::from_secs(95) && ttl <= Duration::from_secs(105));
/// ```
#[derive(Debug)]
pub struct Unstable {
    deviation: f64,
    rng: Mutex<StdRng>,
}

impl Unstable {
    /// Creates a generator; `deviation` is clamped to `[0, 1]`.
    pub fn new(deviation: f64) -> Self {
        Self::with_rng(deviation, StdRng::from_entropy())
    }

    /// Creates a generator with a deterministic seed.
    pub fn seeded(deviation: f64, seed: u64) -> Self {
        Self::with_rng(deviation, StdRng::seed_from_u64(seed))
    }

    fn with_rng(deviation: f64, rng: StdRng) -> Self {
        let deviation = if deviation.is_nan() {
            0.0
        } else {
            deviation.clamp(0.0, 1.0)
        };
        Self {
            deviation,
            rng: Mutex::new(rng),
        }
    }

    pub fn deviation(&self) -> f64 {
        self.deviation
    }

    fn factor(&self) -> f64 {
        let r: f64 = self.rng.lock().gen();
        1.0 + self.deviation - 2.0 * self.deviation * r
    }

    /// Returns `base` scaled by a random factor within the deviation.
    pub fn around_duration(&self, base: Duration) -> Duration {
        if self.deviation == 0.0 {
            return base;
        }
        Duration::try_from_secs_f64(base.as_secs_f64() * self.factor()).unwrap_or(Duration::MAX)
    }

    /// Returns `base` scaled by a random factor within the deviation, truncated.
    pub fn around_int(&self, base: i64) -> i64 {
        (self.factor() * base as f64) as i64
    }
}
