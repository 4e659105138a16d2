//! Slot arena with stable integer handles.
//!
//! Each slot is either occupied or vacant; vacant slots form a chain threaded
//! through the slots themselves, so freeing and reusing a slot allocates
//! nothing. A [`SlotId`] stays valid until its slot is removed. The index is
//! then recycled, so owners must forget every copy of a handle before
//! removing its slot.
//!
//! ```text
//!   slots:  [ Occupied(a) | Vacant(→3) | Occupied(b) | Vacant(end) ]
//!   free:   1 ─► 3 ─► end
//! ```
//!
//! Used by [`IntrusiveList`](crate::ds::IntrusiveList) for list nodes and by
//! the [`TimingWheel`](crate::timer::TimingWheel) for timer entries.

/// Stable handle into a [`SlotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) usize);

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    /// Next vacant slot in the free chain.
    Vacant(Option<usize>),
}

#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free: Option<usize>,
    occupied: usize,
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: None,
            occupied: 0,
        }
    }

    /// Stores `value` in the most recently freed slot, or a new one.
    pub fn insert(&mut self, value: T) -> SlotId {
        self.occupied += 1;
        match self.free {
            Some(idx) => {
                if let Slot::Vacant(next) = self.slots[idx] {
                    self.free = next;
                }
                self.slots[idx] = Slot::Occupied(value);
                SlotId(idx)
            },
            None => {
                self.slots.push(Slot::Occupied(value));
                SlotId(self.slots.len() - 1)
            },
        }
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.0)?;
        match std::mem::replace(slot, Slot::Vacant(self.free)) {
            Slot::Occupied(value) => {
                self.free = Some(id.0);
                self.occupied -= 1;
                Some(value)
            },
            vacant => {
                *slot = vacant;
                None
            },
        }
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        match self.slots.get(id.0)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant(_) => None,
        }
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        match self.slots.get_mut(id.0)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Drops every value and releases the backing storage.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.free = None;
        self.occupied = 0;
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slots_are_reused_last_in_first_out() {
        let mut arena = SlotArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        let c = arena.insert("c");
        assert_eq!(arena.len(), 3);

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.remove(c), Some("c"));
        assert_eq!(arena.remove(c), None);
        assert_eq!(arena.len(), 1);

        assert_eq!(arena.insert("d"), c);
        assert_eq!(arena.insert("e"), a);
        assert_eq!(arena.insert("f"), SlotId(3));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.get(a), Some(&"e"));
    }

    #[test]
    fn get_mut_and_vacant_lookups() {
        let mut arena = SlotArena::with_capacity(4);
        let a = arena.insert(1);
        let b = arena.insert(2);
        *arena.get_mut(b).unwrap() = 20;
        arena.remove(a);

        assert_eq!(arena.get(a), None);
        assert!(arena.get_mut(a).is_none());
        assert_eq!(arena.get(b), Some(&20));
        assert_eq!(arena.get(SlotId(99)), None);
        assert_eq!(arena.remove(SlotId(99)), None);
    }

    #[test]
    fn clear_drops_the_free_chain() {
        let mut arena = SlotArena::new();
        let ids: Vec<_> = (0..16).map(|i| arena.insert(i)).collect();
        for id in &ids[..8] {
            arena.remove(*id);
        }
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.get(ids[12]), None);
        assert_eq!(arena.insert(99), SlotId(0));
        assert_eq!(arena.insert(100), SlotId(1));
    }
}
