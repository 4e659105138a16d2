//! Doubly linked recency list over a [`SlotArena`].
//!
//! Nodes link to each other by [`SlotId`], so a side index can keep a node's
//! handle and splice it in O(1) without raw pointers. The list only grows at
//! the front and shrinks anywhere, which is all an LRU needs.
//!
//! ```text
//!   ends = Some((head, tail))
//!
//!   head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail
//!   (most recent)                    (least recent)
//! ```
//!
//! `push_front`, `pop_back`, `remove` and `move_to_front` are O(1).
use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::InvariantError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Links {
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    links: Links,
}

#[derive(Debug)]
pub struct IntrusiveList<T> {
    nodes: SlotArena<Node<T>>,
    /// Head and tail; both set or both unset.
    ends: Option<(SlotId, SlotId)>,
}

impl<T> IntrusiveList<T> {
    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotArena::with_capacity(capacity),
            ends: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_none()
    }

    /// Least recently pushed or moved value.
    pub fn back(&self) -> Option<&T> {
        let (_, tail) = self.ends?;
        self.get(tail)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.nodes.get(id).map(|node| &node.value)
    }

    /// Iterates from the most recent to the least recent value.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            nodes: &self.nodes,
            cursor: self.ends.map(|(head, _)| head),
        }
    }

    pub fn push_front(&mut self, value: T) -> SlotId {
        let id = self.nodes.insert(Node {
            value,
            links: Links::default(),
        });
        self.link_front(id);
        id
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let (_, tail) = self.ends?;
        self.remove(tail)
    }

    /// Unlinks `id` and frees its node. Unknown ids return `None`.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        self.unlink(id)?;
        self.nodes.remove(id).map(|node| node.value)
    }

    /// Makes `id` the most recent node; returns `false` if it is unknown.
    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        match self.ends {
            Some((head, _)) if head == id => true,
            _ => {
                if self.unlink(id).is_none() {
                    return false;
                }
                self.link_front(id);
                true
            },
        }
    }

    fn links_mut(&mut self, id: SlotId) -> Option<&mut Links> {
        self.nodes.get_mut(id).map(|node| &mut node.links)
    }

    /// Splices `id` out of the chain, leaving its node allocated.
    fn unlink(&mut self, id: SlotId) -> Option<()> {
        let Links { prev, next } = std::mem::take(self.links_mut(id)?);
        let (head, tail) = self.ends?;

        let head = match prev {
            Some(p) => {
                if let Some(links) = self.links_mut(p) {
                    links.next = next;
                }
                head
            },
            None => match next {
                Some(n) => n,
                None => {
                    self.ends = None;
                    return Some(());
                },
            },
        };
        let tail = match next {
            Some(n) => {
                if let Some(links) = self.links_mut(n) {
                    links.prev = prev;
                }
                tail
            },
            None => prev.unwrap_or(head),
        };
        self.ends = Some((head, tail));
        Some(())
    }

    /// Links an allocated, unlinked node in as the new head.
    fn link_front(&mut self, id: SlotId) {
        let old_head = self.ends.map(|(head, _)| head);
        if let Some(links) = self.links_mut(id) {
            *links = Links {
                prev: None,
                next: old_head,
            };
        }
        self.ends = match self.ends {
            Some((head, tail)) => {
                if let Some(links) = self.links_mut(head) {
                    links.prev = Some(id);
                }
                Some((id, tail))
            },
            None => Some((id, id)),
        };
    }

    /// Walks the chain and verifies link symmetry, the tail and the length.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let Some((head, tail)) = self.ends else {
            return if self.nodes.is_empty() {
                Ok(())
            } else {
                Err(InvariantError::new(format!(
                    "empty chain but {} nodes allocated",
                    self.nodes.len()
                )))
            };
        };

        let mut walked = 0usize;
        let mut expected_prev = None;
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| InvariantError::new("chain links to a freed node"))?;
            if node.links.prev != expected_prev {
                return Err(InvariantError::new("prev link does not match traversal"));
            }
            walked += 1;
            if walked > self.len() {
                return Err(InvariantError::new("cycle detected in list"));
            }
            expected_prev = Some(id);
            cursor = node.links.next;
        }

        if expected_prev != Some(tail) {
            return Err(InvariantError::new("last node is not the tail"));
        }
        if walked != self.len() {
            return Err(InvariantError::new(format!(
                "chain has {} nodes, arena holds {}",
                walked,
                self.len()
            )));
        }
        Ok(())
    }
}

/// Front-to-back iterator over an [`IntrusiveList`].
pub struct Iter<'a, T> {
    nodes: &'a SlotArena<Node<T>>,
    cursor: Option<SlotId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.links.next;
        Some(&node.value)
    }
}
