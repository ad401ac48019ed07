// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use basalt_ordering_types::{
    batch::{Batch, BatchIdentity},
    HashValue,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};

#[cfg(test)]
#[path = "batch_cache_test.rs"]
mod batch_cache_test;

/// Number of round slots a propagated batch stays resendable for.
const CACHE_SLOTS: usize = 3;

type BatchSlot = HashMap<BatchIdentity, Batch>;

/// Three-slot FIFO of batches the gate has propagated: head is the
/// current round's resend set, middle one round ahead, tail two ahead.
///
/// `pop` rotates the buffer, so a batch entering the tail is resent twice
/// before falling out, unless a commit removes it first. Slots are keyed
/// by batch identity; re-adding a known batch keeps the first copy.
pub struct BatchCache {
    slots: RwLock<VecDeque<BatchSlot>>,
}

impl Default for BatchCache {
    fn default() -> Self {
        let mut slots = VecDeque::with_capacity(CACHE_SLOTS);
        for _ in 0..CACHE_SLOTS {
            slots.push_back(BatchSlot::new());
        }
        Self { slots: RwLock::new(slots) }
    }
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union the batches into the tail slot.
    pub fn add_to_back(&self, batches: impl IntoIterator<Item = Batch>) {
        let mut slots = self.slots.write();
        let tail = slots.back_mut().expect("cache always holds three slots");
        for batch in batches {
            tail.entry(batch.identity()).or_insert(batch);
        }
    }

    /// Take the head slot and rotate: the middle slot becomes the head, a
    /// fresh empty tail is appended.
    pub fn pop(&self) -> Vec<Batch> {
        let mut slots = self.slots.write();
        let head = slots.pop_front().expect("cache always holds three slots");
        slots.push_back(BatchSlot::new());
        head.into_values().collect()
    }

    /// Erase every batch all of whose transaction hashes appear in
    /// `processed`. Partial overlap keeps the batch: its remaining
    /// transactions still await ordering.
    pub fn remove(&self, processed: &HashSet<HashValue>) {
        let mut slots = self.slots.write();
        for slot in slots.iter_mut() {
            slot.retain(|_, batch| {
                !batch.tx_hashes().iter().all(|hash| processed.contains(hash))
            });
        }
    }

    /// Batches currently in the head slot.
    pub fn head(&self) -> Vec<Batch> {
        self.slots.read().front().expect("cache always holds three slots").values().cloned().collect()
    }

    /// Batches currently in the tail slot.
    pub fn tail(&self) -> Vec<Batch> {
        self.slots.read().back().expect("cache always holds three slots").values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().iter().all(HashMap::is_empty)
    }
}
