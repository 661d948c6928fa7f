//! Ordered registry of unique keys with constant-time reordering.
//!
//! Keys live in an arena of slots threaded into a doubly-linked list by slot
//! index. A `HashMap` from key to slot makes every positional edit O(1);
//! freed slots are recycled so the arena only grows to the peak key count.

use std::{collections::HashMap, fmt, hash::Hash};

use tracing::debug;

use crate::error::DesignError;

type SlotIndex = usize;

#[derive(Debug, Clone)]
struct Slot<K> {
    key: K,
    prev: Option<SlotIndex>,
    next: Option<SlotIndex>,
}

/// Insertion-ordered set supporting insert-before, move-before and removal.
#[derive(Debug, Clone)]
pub struct OrderedIndex<K> {
    slots: Vec<Option<Slot<K>>>,
    free: Vec<SlotIndex>,
    head: Option<SlotIndex>,
    tail: Option<SlotIndex>,
    index: HashMap<K, SlotIndex>,
}

impl<K> Default for OrderedIndex<K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
        }
    }
}

impl<K> OrderedIndex<K>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `key` is currently stored.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Place `key` before `before`, or at the end when `before` is `None` or unknown.
    ///
    /// A key that is already stored is moved instead of duplicated.
    pub fn insert_before(&mut self, key: K, before: Option<&K>) -> Result<(), DesignError> {
        if before == Some(&key) {
            return Err(DesignError::self_reference(&key));
        }
        if self.contains(&key) {
            return self.move_before(&key, before);
        }

        let target = self.resolve_before(before);
        let slot = self.allocate(key.clone());
        self.link_before(slot, target);
        self.index.insert(key, slot);
        Ok(())
    }

    /// Move an existing key before `before`, appending when `before` is `None` or unknown.
    pub fn move_before(&mut self, key: &K, before: Option<&K>) -> Result<(), DesignError> {
        if before == Some(key) {
            return Err(DesignError::self_reference(key));
        }
        let slot = *self
            .index
            .get(key)
            .ok_or_else(|| DesignError::not_found(key))?;

        let target = self.resolve_before(before);
        self.unlink(slot);
        self.link_before(slot, target);
        Ok(())
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(slot) = self.index.remove(key) else {
            return false;
        };
        self.unlink(slot);
        self.slots[slot] = None;
        self.free.push(slot);
        true
    }

    /// Drop every key.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.index.clear();
    }

    /// Lazily walk the keys in order. Call again to restart.
    pub fn ordered_keys(&self) -> Iter<'_, K> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
            remaining: self.index.len(),
        }
    }

    /// Owned snapshot of the current order.
    pub fn to_vec(&self) -> Vec<K> {
        self.ordered_keys().cloned().collect()
    }

    fn resolve_before(&self, before: Option<&K>) -> Option<SlotIndex> {
        let before = before?;
        let found = self.index.get(before).copied();
        if found.is_none() {
            debug!(before = %before, "unknown insertion point; appending");
        }
        found
    }

    fn allocate(&mut self, key: K) -> SlotIndex {
        let slot = Slot {
            key,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    fn links(&self, slot: SlotIndex) -> Option<(Option<SlotIndex>, Option<SlotIndex>)> {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .map(|entry| (entry.prev, entry.next))
    }

    fn slot_mut(&mut self, slot: SlotIndex) -> Option<&mut Slot<K>> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    fn unlink(&mut self, slot: SlotIndex) {
        let Some((prev, next)) = self.links(slot) else {
            return;
        };

        match prev {
            Some(prev) => {
                if let Some(entry) = self.slot_mut(prev) {
                    entry.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(entry) = self.slot_mut(next) {
                    entry.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(entry) = self.slot_mut(slot) {
            entry.prev = None;
            entry.next = None;
        }
    }

    fn link_before(&mut self, slot: SlotIndex, before: Option<SlotIndex>) {
        let (prev, next) = match before {
            Some(before) => (self.links(before).and_then(|(prev, _)| prev), Some(before)),
            None => (self.tail, None),
        };

        if let Some(entry) = self.slot_mut(slot) {
            entry.prev = prev;
            entry.next = next;
        }
        match prev {
            Some(prev) => {
                if let Some(entry) = self.slot_mut(prev) {
                    entry.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        match next {
            Some(next) => {
                if let Some(entry) = self.slot_mut(next) {
                    entry.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }
    }
}

impl<K> FromIterator<K> for OrderedIndex<K>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut index = Self::new();
        for key in iter {
            // Duplicates collapse onto their last position.
            let _ = index.insert_before(key, None);
        }
        index
    }
}

/// Borrowing iterator over an [`OrderedIndex`] in display order.
#[derive(Debug, Clone)]
pub struct Iter<'a, K> {
    slots: &'a [Option<Slot<K>>],
    cursor: Option<SlotIndex>,
    remaining: usize,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.get(self.cursor?)?.as_ref()?;
        self.cursor = slot.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some(&slot.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K> ExactSizeIterator for Iter<'_, K> {}
