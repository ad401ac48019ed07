// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use basalt_ordering_types::batch::{Batch, BatchIdentity};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

/// Strategy deciding when a pending batch is done collecting signatures
/// and when it has aged out.
pub trait Completer: Send + Sync {
    fn is_completed(&self, batch: &Batch) -> bool;
    fn is_expired(&self, batch: &Batch, now_ms: u64) -> bool;
}

/// Default policy: complete once every member transaction reaches its
/// quorum, expired once every member is older than `expiration_ms`.
pub struct DefaultCompleter {
    expiration_ms: u64,
}

impl DefaultCompleter {
    pub fn new(expiration_ms: u64) -> Self {
        Self { expiration_ms }
    }
}

impl Completer for DefaultCompleter {
    fn is_completed(&self, batch: &Batch) -> bool {
        batch.is_complete()
    }

    fn is_expired(&self, batch: &Batch, now_ms: u64) -> bool {
        batch.is_expired(now_ms, self.expiration_ms)
    }
}

/// Outcome of folding batches into a state: which batches just reached
/// completion and which merely grew their signature sets.
#[derive(Debug, Default)]
pub struct StateUpdateResult {
    pub completed: Vec<Batch>,
    pub updated: Vec<Batch>,
}

impl StateUpdateResult {
    pub fn absorb(&mut self, other: StateUpdateResult) {
        self.completed.extend(other.completed);
        self.updated.extend(other.updated);
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.updated.is_empty()
    }
}

/// Set of pending batches keyed by identity, closed under signature-union
/// insertion.
///
/// Completion removes a batch from the state: once every member reached
/// quorum the batch belongs to the ordering pipeline, not to signature
/// collection. The first-seen copy of a batch wins; later copies only
/// contribute signatures.
#[derive(Clone)]
pub struct MstState {
    completer: Arc<dyn Completer>,
    batches: HashMap<BatchIdentity, Batch>,
}

impl MstState {
    pub fn empty(completer: Arc<dyn Completer>) -> Self {
        Self { completer, batches: HashMap::new() }
    }

    /// Fold one batch in, unioning signatures into any existing copy.
    pub fn insert(&mut self, batch: Batch) -> StateUpdateResult {
        let mut update = StateUpdateResult::default();
        self.insert_one(&mut update, batch);
        update
    }

    /// Fold every batch of `other` in.
    pub fn merge(&mut self, other: &MstState) -> StateUpdateResult {
        let mut update = StateUpdateResult::default();
        for batch in other.batches.values() {
            self.insert_one(&mut update, batch.clone());
        }
        update
    }

    /// Batches present here but absent, by identity, in `other`.
    /// Signature differences on shared batches do not count.
    pub fn diff(&self, other: &MstState) -> MstState {
        let batches = self
            .batches
            .iter()
            .filter(|(identity, _)| !other.batches.contains_key(*identity))
            .map(|(identity, batch)| (identity.clone(), batch.clone()))
            .collect();
        Self { completer: Arc::clone(&self.completer), batches }
    }

    /// Remove and return every batch expired at `now_ms`. Expiration
    /// never reports a batch as completed, whatever its signature set.
    pub fn erase_expired(&mut self, now_ms: u64) -> Vec<Batch> {
        let expired: Vec<BatchIdentity> = self
            .batches
            .iter()
            .filter(|(_, batch)| self.completer.is_expired(batch, now_ms))
            .map(|(identity, _)| identity.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|identity| self.batches.remove(&identity))
            .collect()
    }

    pub fn batches(&self) -> impl Iterator<Item = &Batch> {
        self.batches.values()
    }

    pub fn contains(&self, identity: &BatchIdentity) -> bool {
        self.batches.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    fn insert_one(&mut self, update: &mut StateUpdateResult, batch: Batch) {
        use std::collections::hash_map::Entry;

        match self.batches.entry(batch.identity()) {
            Entry::Occupied(mut slot) => {
                let grew = slot.get_mut().merge_signatures(&batch);
                if self.completer.is_completed(slot.get()) {
                    update.completed.push(slot.remove());
                } else if grew {
                    update.updated.push(slot.get().clone());
                }
            }
            Entry::Vacant(slot) => {
                if self.completer.is_completed(&batch) {
                    update.completed.push(batch);
                } else {
                    update.updated.push(batch.clone());
                    slot.insert(batch);
                }
            }
        }
    }
}

/// States compare as identity sets; signature progress is invisible to
/// equality, like everywhere else in batch land.
impl PartialEq for MstState {
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&BatchIdentity> = self.batches.keys().collect();
        let theirs: HashSet<&BatchIdentity> = other.batches.keys().collect();
        ours == theirs
    }
}

impl Eq for MstState {}
