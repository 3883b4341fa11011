// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recycling arena for batch items.

use alloc::vec::Vec;

use crate::item::BatchItem;

/// Generational handle of an item slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(u32, u32);

impl ItemKey {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Item keys are intentionally 32-bit; the pool never grows past u32::MAX slots."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    live: bool,
    item: BatchItem,
}

/// Slot arena of [`BatchItem`]s with a free list.
///
/// Every checkout hands out an item in its default state, whatever the slot held before.
#[derive(Clone, Debug, Default)]
pub struct ItemPool {
    slots: Vec<Slot>,
    free_list: Vec<usize>,
    live: usize,
}

impl ItemPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a clean item, returning its key and the item.
    pub fn checkout(&mut self) -> (ItemKey, &mut BatchItem) {
        let idx = if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            self.slots.push(Slot::default());
            self.slots.len() - 1
        };
        let slot = &mut self.slots[idx];
        slot.generation = slot.generation.wrapping_add(1);
        slot.live = true;
        slot.item.reset();
        self.live += 1;
        (ItemKey::new(idx, slot.generation), &mut slot.item)
    }

    /// Return an item to the pool. Returns `false` for a stale key.
    ///
    /// The item must already be out of any spatial index.
    pub fn cache(&mut self, key: ItemKey) -> bool {
        let Some(slot) = self.live_slot_mut(key) else {
            return false;
        };
        debug_assert!(
            !slot.item.proxy.is_valid(),
            "item returned to the pool while still indexed"
        );
        slot.live = false;
        slot.item.reset();
        self.free_list.push(key.idx());
        self.live -= 1;
        true
    }

    /// Live item for `key`.
    pub fn get(&self, key: ItemKey) -> Option<&BatchItem> {
        let slot = self.slots.get(key.idx())?;
        (slot.live && slot.generation == key.1).then_some(&slot.item)
    }

    /// Mutable live item for `key`.
    pub fn get_mut(&mut self, key: ItemKey) -> Option<&mut BatchItem> {
        self.live_slot_mut(key).map(|s| &mut s.item)
    }

    /// Iterate over live items.
    pub fn iter(&self) -> impl Iterator<Item = (ItemKey, &BatchItem)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.live)
            .map(|(i, s)| (ItemKey::new(i, s.generation), &s.item))
    }

    /// Iterate mutably over live items.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ItemKey, &mut BatchItem)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, s)| s.live)
            .map(|(i, s)| (ItemKey::new(i, s.generation), &mut s.item))
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no item is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of recycled slots waiting for reuse.
    pub fn cached(&self) -> usize {
        self.free_list.len()
    }

    /// Dense slot index, for side tables sized by [`capacity`](Self::capacity).
    pub(crate) fn slot_index(key: ItemKey) -> usize {
        key.idx()
    }

    /// Number of slots ever allocated.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn live_slot_mut(&mut self, key: ItemKey) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(key.idx())?;
        (slot.live && slot.generation == key.1).then_some(slot)
    }
}
