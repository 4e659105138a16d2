//! Two-generation hash map that bounds the memory left behind by deletions.
//!
//! A hash table that sees heavy insert/delete churn keeps the capacity of its
//! largest moment forever. `LeakSafeMap` splits its entries over an `old` and a
//! `new` generation and counts deletions per generation. Once a generation has
//! absorbed `max_deletion` deletions while holding fewer than `copy_threshold`
//! live entries, its survivors are folded into the other generation and its
//! allocation is dropped, so the wasted capacity stays proportional to the
//! threshold instead of to the peak size.
//!
//! ## Architecture
//!
//! ```text
//!   put(k, v)                          remove(k)
//!      │                                  │
//!      ▼                                  ▼
//!   old.deletions <= max? ──yes──► old    delete from whichever generation
//!      │                                  holds k, bump its counter
//!      no                                 │
//!      ▼                                  ▼
//!     new                          old.deletions >= max && old.len < floor
//!                                       → fold old into new, new becomes old
//!                                  new.deletions >= max && new.len < floor
//!                                       → fold new into old, reset new
//! ```
//!
//! A key lives in at most one generation at a time: `put` removes any copy in
//! the generation it is not writing to.
//!
//! The [`TimingWheel`](crate::timer::TimingWheel) uses this map as its
//! key → slot index, which deletes an entry on every expiry and every
//! cancellation.

use std::borrow::Borrow;
use std::hash::Hash;
use std::mem;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::InvariantError;

/// Deletions a generation absorbs before it becomes eligible for compaction.
pub const MAX_DELETION: usize = 10_000;

/// A generation is only compacted while it holds fewer live entries than this.
pub const COPY_THRESHOLD: usize = 1_000;

#[derive(Debug)]
struct Generation<K, V> {
    map: FxHashMap<K, V>,
    deletions: usize,
}

impl<K, V> Default for Generation<K, V> {
    fn default() -> Self {
        Self {
            map: FxHashMap::default(),
            deletions: 0,
        }
    }
}

/// Single-threaded two-generation map.
///
/// # Example
///
/// ```
/// use expirykit::ds::LeakSafeMap;
///
/// let mut map = LeakSafeMap::new();
/// map.put("a", 1);
/// assert_eq!(map.get("a"), Some(&1));
/// assert_eq!(map.remove("a"), Some(1));
/// assert!(map.is_empty());
/// ```
#[derive(Debug)]
pub struct LeakSafeMap<K, V> {
    old: Generation<K, V>,
    new: Generation<K, V>,
    max_deletion: usize,
    copy_threshold: usize,
}

impl<K, V> LeakSafeMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty map with the default thresholds.
    pub fn new() -> Self {
        Self::with_thresholds(MAX_DELETION, COPY_THRESHOLD)
    }

    /// Creates an empty map with custom compaction thresholds.
    ///
    /// `max_deletion` is clamped to at least 1.
    pub fn with_thresholds(max_deletion: usize, copy_threshold: usize) -> Self {
        Self {
            old: Generation::default(),
            new: Generation::default(),
            max_deletion: max_deletion.max(1),
            copy_threshold,
        }
    }

    /// Inserts or replaces `key`, returning the previous value.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let (target, other) = if self.old.deletions <= self.max_deletion {
            (&mut self.old, &mut self.new)
        } else {
            (&mut self.new, &mut self.old)
        };

        let moved = other.map.remove(&key);
        if moved.is_some() {
            other.deletions += 1;
        }
        let previous = target.map.insert(key, value);
        previous.or(moved)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.old.map.get(key).or_else(|| self.new.map.get(key))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if self.old.map.contains_key(key) {
            return self.old.map.get_mut(key);
        }
        self.new.map.get_mut(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.old.map.contains_key(key) || self.new.map.contains_key(key)
    }

    /// Removes `key`, charging the deletion to the generation that held it,
    /// then compacts whichever generation crossed the threshold.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let removed = if let Some(value) = self.old.map.remove(key) {
            self.old.deletions += 1;
            Some(value)
        } else if let Some(value) = self.new.map.remove(key) {
            self.new.deletions += 1;
            Some(value)
        } else {
            None
        };

        self.compact();
        removed
    }

    fn compact(&mut self) {
        if self.old.deletions >= self.max_deletion && self.old.map.len() < self.copy_threshold {
            let old = mem::take(&mut self.old);
            let mut merged = mem::take(&mut self.new);
            merged.map.extend(old.map);
            self.old = merged;
            tracing::trace!(
                live = self.old.map.len(),
                "compacted old generation into new"
            );
        }

        if self.new.deletions >= self.max_deletion && self.new.map.len() < self.copy_threshold {
            let new = mem::take(&mut self.new);
            self.old.map.extend(new.map);
            tracing::trace!(
                live = self.old.map.len(),
                "compacted new generation into old"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.old.map.len() + self.new.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.old.map.is_empty() && self.new.map.is_empty()
    }

    /// Calls `f` for every entry until it returns `false`.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for (k, v) in self.iter() {
            if !f(k, v) {
                return;
            }
        }
    }

    /// Iterates the old generation, then the new one.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.old.map.iter().chain(self.new.map.iter())
    }

    /// Drops every entry and both generations' allocations.
    pub fn clear(&mut self) {
        self.old = Generation::default();
        self.new = Generation::default();
    }

    /// Returns the pending deletion counters as `(old, new)`.
    pub fn deletion_counts(&self) -> (usize, usize) {
        (self.old.deletions, self.new.deletions)
    }

    /// Verifies that no key is present in both generations.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let (small, large) = if self.old.map.len() <= self.new.map.len() {
            (&self.old.map, &self.new.map)
        } else {
            (&self.new.map, &self.old.map)
        };
        if small.keys().any(|k| large.contains_key(k)) {
            return Err(InvariantError::new("key present in both generations"));
        }
        Ok(())
    }
}

impl<K, V> Default for LeakSafeMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper around [`LeakSafeMap`] using a `parking_lot::RwLock`.
#[derive(Debug)]
pub struct ConcurrentLeakSafeMap<K, V> {
    inner: RwLock<LeakSafeMap<K, V>>,
}

impl<K, V> ConcurrentLeakSafeMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LeakSafeMap::new()),
        }
    }

    pub fn with_thresholds(max_deletion: usize, copy_threshold: usize) -> Self {
        Self {
            inner: RwLock::new(LeakSafeMap::with_thresholds(max_deletion, copy_threshold)),
        }
    }

    pub fn put(&self, key: K, value: V) -> Option<V> {
        let mut map = self.inner.write();
        map.put(key, value)
    }

    /// Returns a clone of the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        let map = self.inner.read();
        map.get(key).cloned()
    }

    pub fn get_with<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let map = self.inner.read();
        map.get(key).map(f)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut map = self.inner.write();
        map.remove(key)
    }

    pub fn len(&self) -> usize {
        let map = self.inner.read();
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        let map = self.inner.read();
        map.is_empty()
    }

    /// Calls `f` for every entry under the read lock until it returns `false`.
    pub fn range<F>(&self, f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let map = self.inner.read();
        map.range(f);
    }
}

impl<K, V> Default for ConcurrentLeakSafeMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
