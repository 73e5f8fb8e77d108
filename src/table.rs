//! Growable flat slot table with linear-scan allocation and lookup.
//!
//! Arena-style storage for a small, churny set of entries: a flat array of
//! slots, each free or holding one live entry. Allocation reuses the first
//! free slot; when the scan finds none, capacity grows by a fixed increment.
//! Capacity never shrinks and slots never move, so indices stay stable for
//! the lifetime of an entry. All operations are O(n) over capacity, which is
//! the point: entry counts here are single-digit to low tens, and a flat
//! scan beats pointer-chasing at that scale.

use core::num::NonZeroUsize;

pub(crate) struct SlotTable<T> {
    slots: Vec<Option<T>>,
    grow_by: NonZeroUsize,
    high_water: usize,
}

impl<T> SlotTable<T> {
    /// Creates a table with `initial_slots` free slots, growing by `grow_by`
    /// whenever a full scan finds no free slot.
    pub fn new(initial_slots: usize, grow_by: NonZeroUsize) -> Self {
        Self {
            slots: (0..initial_slots).map(|_| None).collect(),
            grow_by,
            high_water: 0,
        }
    }

    /// Current capacity (occupied + free slots).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Highest occupancy ever observed.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Entry at `idx`, if occupied.
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    /// Mutable entry at `idx`, if occupied.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Index of the first occupied slot whose entry matches `pred`.
    pub fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(&mut pred))
    }

    /// Index of the first free slot, growing the table if every slot is
    /// occupied. Growth appends `grow_by` free slots; existing entries keep
    /// their indices.
    pub fn allocate(&mut self) -> usize {
        if let Some(idx) = self.slots.iter().position(Option::is_none) {
            return idx;
        }
        let old_len = self.slots.len();
        self.slots
            .extend((0..self.grow_by.get()).map(|_| None::<T>));
        old_len
    }

    /// Stores `value` in the first free slot and returns its index.
    pub fn insert(&mut self, value: T) -> usize {
        let idx = self.allocate();
        self.slots[idx] = Some(value);
        self.high_water = self.high_water.max(self.occupied());
        idx
    }

    /// Removes and returns the entry at `idx`, freeing the slot for reuse.
    pub fn take(&mut self, idx: usize) -> Option<T> {
        self.slots.get_mut(idx).and_then(Option::take)
    }
}
