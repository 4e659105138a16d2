//! Coalesced execution of concurrent calls for the same key.
//!
//! The first caller for a key becomes the leader and runs the work function;
//! callers arriving while it runs park on the same call slot and receive a
//! clone of the leader's result. The slot is cleared as soon as the leader
//! finishes, so later callers start a fresh call.
//!
//! ```text
//!   caller A ──► calls[k] empty ──► insert slot, run f() ──► Done(v) ──► v
//!   caller B ──► calls[k] = slot ─────────── wait ─────────────────────► v
//!   caller C ──► calls[k] = slot ─────────── wait ─────────────────────► v
//! ```
//!
//! If the leader panics, the slot is marked as failed and every waiter panics
//! with a descriptive message instead of blocking forever.

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

#[derive(Debug)]
enum CallState<T> {
    Pending,
    Done(T),
    Panicked,
}

#[derive(Debug)]
struct Call<T> {
    state: Mutex<CallState<T>>,
    done: Condvar,
}

impl<T: Clone> Call<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(CallState::Pending),
            done: Condvar::new(),
        }
    }

    fn resolve(&self, outcome: CallState<T>) {
        *self.state.lock() = outcome;
        self.done.notify_all();
    }

    fn wait(&self) -> T {
        let mut state = self.state.lock();
        loop {
            match &*state {
                CallState::Done(value) => return value.clone(),
                CallState::Panicked => panic!("single flight leader panicked before producing a result"),
                CallState::Pending => {},
            }
            self.done.wait(&mut state);
        }
    }
}

/// Deduplicates concurrent calls keyed by `K`, sharing a result of type `T`.
///
/// # Example
///
/// ```
/// use expirykit::sync::SingleFlight;
///
/// let flight: SingleFlight<&str, u64> = SingleFlight::new();
/// let (value, fresh) = flight.do_ex("answer", || 42);
/// assert_eq!(value, 42);
/// assert!(fresh);
/// ```
#[derive(Debug)]
pub struct SingleFlight<K, T> {
    calls: Mutex<FxHashMap<K, Arc<Call<T>>>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Runs `f` unless a call for `key` is already in flight; returns the result.
    pub fn do_call<F>(&self, key: K, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.do_ex(key, f).0
    }

    /// Like [`do_call`](Self::do_call), also reporting whether this caller ran `f`.
    pub fn do_ex<F>(&self, key: K, f: F) -> (T, bool)
    where
        F: FnOnce() -> T,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(&key) {
                let existing = Arc::clone(existing);
                drop(calls);
                return (existing.wait(), false);
            }
            let call = Arc::new(Call::new());
            calls.insert(key.clone(), Arc::clone(&call));
            call
        };

        let mut leader = Leader {
            flight: self,
            key: &key,
            call: &call,
            armed: true,
        };
        let value = f();
        leader.finish(CallState::Done(value.clone()));
        (value, true)
    }

    /// Number of keys with a call currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn forget(&self, key: &K) {
        self.calls.lock().remove(key);
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the slot and wakes waiters when the leader finishes or unwinds.
struct Leader<'a, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    flight: &'a SingleFlight<K, T>,
    key: &'a K,
    call: &'a Call<T>,
    armed: bool,
}

impl<K, T> Leader<'_, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn finish(&mut self, outcome: CallState<T>) {
        self.armed = false;
        self.flight.forget(self.key);
        self.call.resolve(outcome);
    }
}

impl<K, T> Drop for Leader<'_, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn drop(&mut self) {
        if self.armed {
            self.finish(CallState::Panicked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn sequential_calls_each_run() {
        let flight = SingleFlight::new();
        let runs = AtomicUsize::new(0);
        for _ in 0..3 {
            let (v, fresh) = flight.do_ex("k", || runs.fetch_add(1, Ordering::SeqCst) + 1);
            assert!(fresh);
            assert!(v >= 1);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn concurrent_calls_share_one_execution() {
        let flight = Arc::new(SingleFlight::<&str, Result<u32, String>>::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    flight.do_ex("key", || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(100));
                        Ok(7)
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(results.iter().filter(|(_, fresh)| *fresh).count(), 1);
        assert!(results.iter().all(|(v, _)| v == &Ok(7)));
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn distinct_keys_do_not_coalesce() {
        let flight = SingleFlight::new();
        assert_eq!(flight.do_call(1u32, || "one"), "one");
        assert_eq!(flight.do_call(2u32, || "two"), "two");
    }

    #[test]
    fn leader_panic_releases_waiters() {
        let flight = Arc::new(SingleFlight::<u8, u8>::new());
        let started = Arc::new(Barrier::new(2));

        let leader = {
            let flight = Arc::clone(&flight);
            let started = Arc::clone(&started);
            thread::spawn(move || {
                flight.do_call(1, || {
                    started.wait();
                    thread::sleep(Duration::from_millis(100));
                    panic!("leader failed");
                })
            })
        };

        started.wait();
        let waiter = {
            let flight = Arc::clone(&flight);
            thread::spawn(move || {
                panic::catch_unwind(AssertUnwindSafe(|| flight.do_call(1, || 5))).ok()
            })
        };

        assert!(leader.join().is_err());
        // the waiter either joined the failed call or started a new one
        let outcome = waiter.join().unwrap();
        assert!(outcome.is_none() || outcome == Some(5));
        assert_eq!(flight.in_flight(), 0);
    }
}
