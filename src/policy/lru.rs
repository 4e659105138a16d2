//! # Least Recently Used (LRU) key index
//!
//! Recency bookkeeping for [`Cache`](crate::cache::Cache). The index tracks
//! keys only; values stay in the cache's own map. When a bounded index grows
//! past its limit it evicts the least recently used key and reports it through
//! the `on_evict` callback before `add` returns, so the cache can drop the value
//! and cancel its timer in the same critical section.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                        BoundedIndex<K>                            │
//!   │                                                                   │
//!   │   FxHashMap<K, SlotId>             IntrusiveList<K>               │
//!   │   ┌─────────┬────────┐                                            │
//!   │   │  "a"    │ id_1 ──┼──►  head ─► [a] ◄──► [b] ◄──► [c] ◄─ tail   │
//!   │   │  "b"    │ id_2 ──┼──►          MRU                LRU         │
//!   │   │  "c"    │ id_3 ──┼──►                                         │
//!   │   └─────────┴────────┘                                            │
//!   └───────────────────────────────────────────────────────────────────┘
//!
//!   add("d") with limit = 3:
//!     1. push [d] at head
//!     2. len 4 > limit → pop [c] from tail
//!     3. on_evict("c")
//! ```
//!
//! ## Key Components
//!
//! | Component         | Description                                       |
//! |-------------------|---------------------------------------------------|
//! | `RecencyIndex<K>` | Contract shared by the bounded and no-op indexes  |
//! | `BoundedIndex<K>` | List + index map with a fixed capacity            |
//! | `UnboundedIndex`  | No-op variant for caches without a limit          |
//!
//! ## Eviction callback
//!
//! The callback is handed in per call rather than stored, so the caller can
//! borrow its own state (the cache's value map, a list of timers to cancel)
//! while the index is borrowed mutably. Re-entering the index from the
//! callback is impossible by construction.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::error::InvariantError;

/// Recency tracking contract used by the cache.
pub trait RecencyIndex<K> {
    /// Marks `key` as most recently used, inserting it if absent.
    ///
    /// If the index is now over its limit, the least recently used key is
    /// removed and passed to `on_evict` before this call returns.
    fn add(&mut self, key: K, on_evict: &mut dyn FnMut(K));

    /// Forgets `key`, passing it to `on_evict` if it was tracked.
    fn remove(&mut self, key: &K, on_evict: &mut dyn FnMut(K));

    /// Number of tracked keys.
    fn len(&self) -> usize;

    /// Returns `true` when no keys are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity bound, or `None` when unbounded.
    fn limit(&self) -> Option<usize>;
}

/// Fixed-capacity LRU index.
///
/// # Example
///
/// ```
/// use expirykit::policy::lru::{BoundedIndex, RecencyIndex};
///
/// let mut index = BoundedIndex::new(2);
/// let mut evicted = Vec::new();
/// index.add("a", &mut |k| evicted.push(k));
/// index.add("b", &mut |k| evicted.push(k));
/// index.add("a", &mut |k| evicted.push(k)); // touch
/// index.add("c", &mut |k| evicted.push(k));
/// assert_eq!(evicted, vec!["b"]);
/// ```
#[derive(Debug)]
pub struct BoundedIndex<K> {
    limit: usize,
    list: IntrusiveList<K>,
    index: FxHashMap<K, SlotId>,
}

impl<K> BoundedIndex<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates an index holding at most `limit` keys.
    ///
    /// A limit of 0 evicts every key as soon as it is added.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            list: IntrusiveList::with_capacity(limit.saturating_add(1).min(1 << 16)),
            index: FxHashMap::default(),
        }
    }

    /// Returns `true` if `key` is tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates keys from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.list.iter()
    }

    /// Returns the key that would be evicted next.
    pub fn peek_lru(&self) -> Option<&K> {
        self.list.back()
    }

    /// Verifies list/index agreement and the capacity bound.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.list.check_invariants()?;
        if self.list.len() != self.index.len() {
            return Err(InvariantError::new(format!(
                "list holds {} keys, index holds {}",
                self.list.len(),
                self.index.len()
            )));
        }
        if self.list.len() > self.limit {
            return Err(InvariantError::new(format!(
                "{} keys exceed limit {}",
                self.list.len(),
                self.limit
            )));
        }
        for (key, &id) in &self.index {
            if self.list.get(id) != Some(key) {
                return Err(InvariantError::new("index points at a foreign node"));
            }
        }
        Ok(())
    }
}

impl<K> RecencyIndex<K> for BoundedIndex<K>
where
    K: Clone + Eq + Hash,
{
    fn add(&mut self, key: K, on_evict: &mut dyn FnMut(K)) {
        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            return;
        }

        let id = self.list.push_front(key.clone());
        self.index.insert(key, id);

        if self.list.len() > self.limit {
            if let Some(evicted) = self.list.pop_back() {
                self.index.remove(&evicted);
                on_evict(evicted);
            }
        }
    }

    fn remove(&mut self, key: &K, on_evict: &mut dyn FnMut(K)) {
        if let Some(id) = self.index.remove(key) {
            if let Some(removed) = self.list.remove(id) {
                on_evict(removed);
            }
        }
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn limit(&self) -> Option<usize> {
        Some(self.limit)
    }
}

/// Index used when the cache has no capacity limit; tracks nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnboundedIndex;

impl<K> RecencyIndex<K> for UnboundedIndex {
    fn add(&mut self, _key: K, _on_evict: &mut dyn FnMut(K)) {}

    fn remove(&mut self, _key: &K, _on_evict: &mut dyn FnMut(K)) {}

    fn len(&self) -> usize {
        0
    }

    fn limit(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_all(index: &mut BoundedIndex<u32>, keys: &[u32]) -> Vec<u32> {
        let mut evicted = Vec::new();
        for &k in keys {
            index.add(k, &mut |e| evicted.push(e));
        }
        evicted
    }

    // ==============================================
    // Eviction order
    // ==============================================

    #[test]
    fn evicts_least_recently_added_when_full() {
        let mut index = BoundedIndex::new(3);
        let evicted = add_all(&mut index, &[1, 2, 3, 4]);
        assert_eq!(evicted, vec![1]);
        assert_eq!(index.iter().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
        index.check_invariants().unwrap();
    }

    #[test]
    fn touching_protects_from_eviction() {
        let mut index = BoundedIndex::new(3);
        add_all(&mut index, &[1, 2, 3]);
        // touch 1 so 2 becomes the LRU
        let evicted = add_all(&mut index, &[1, 4]);
        assert_eq!(evicted, vec![2]);
        assert!(index.contains(&1));
        assert_eq!(index.peek_lru(), Some(&3));
    }

    #[test]
    fn re_adding_existing_key_never_evicts() {
        let mut index = BoundedIndex::new(2);
        add_all(&mut index, &[1, 2]);
        let evicted = add_all(&mut index, &[1, 2, 1, 2]);
        assert!(evicted.is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn zero_limit_evicts_immediately() {
        let mut index = BoundedIndex::new(0);
        let evicted = add_all(&mut index, &[7]);
        assert_eq!(evicted, vec![7]);
        assert!(index.is_empty());
        index.check_invariants().unwrap();
    }

    // ==============================================
    // Removal
    // ==============================================

    #[test]
    fn remove_reports_key_once() {
        let mut index = BoundedIndex::new(4);
        add_all(&mut index, &[1, 2, 3]);

        let mut removed = Vec::new();
        index.remove(&2, &mut |k| removed.push(k));
        index.remove(&2, &mut |k| removed.push(k));
        index.remove(&9, &mut |k| removed.push(k));

        assert_eq!(removed, vec![2]);
        assert_eq!(index.iter().copied().collect::<Vec<_>>(), vec![3, 1]);
        index.check_invariants().unwrap();
    }

    #[test]
    fn unbounded_index_is_a_no_op() {
        let mut index = UnboundedIndex;
        let mut calls = 0;
        for k in 0..100u32 {
            RecencyIndex::add(&mut index, k, &mut |_| calls += 1);
        }
        RecencyIndex::<u32>::remove(&mut index, &5, &mut |_| calls += 1);
        assert_eq!(calls, 0);
        assert_eq!(RecencyIndex::<u32>::len(&index), 0);
        assert_eq!(RecencyIndex::<u32>::limit(&index), None);
    }

    #[test]
    fn callback_can_mutate_caller_state() {
        let mut index = BoundedIndex::new(1);
        let mut data: std::collections::HashMap<&str, u32> = std::collections::HashMap::new();

        data.insert("a", 1);
        index.add("a", &mut |k| {
            data.remove(k);
        });
        data.insert("b", 2);
        index.add("b", &mut |k| {
            data.remove(k);
        });

        assert_eq!(data.len(), 1);
        assert_eq!(data.get("b"), Some(&2));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: length never exceeds the limit and evictions always
            /// take the least recently touched key.
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_matches_recency_model(
                limit in 1usize..8,
                keys in prop::collection::vec(0u32..16, 0..200)
            ) {
                let mut index = BoundedIndex::new(limit);
                // front = most recent
                let mut model: Vec<u32> = Vec::new();

                for k in keys {
                    let mut evicted = Vec::new();
                    index.add(k, &mut |e| evicted.push(e));

                    model.retain(|&m| m != k);
                    model.insert(0, k);
                    let expected: Vec<u32> = if model.len() > limit {
                        vec![model.pop().unwrap()]
                    } else {
                        Vec::new()
                    };

                    prop_assert_eq!(evicted, expected);
                    prop_assert!(index.len() <= limit);
                    prop_assert_eq!(index.iter().copied().collect::<Vec<_>>(), model.clone());
                }
                prop_assert!(index.check_invariants().is_ok());
            }
        }
    }
}
