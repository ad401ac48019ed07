// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::mst::state::{Completer, MstState, StateUpdateResult};
use basalt_ordering_types::{Batch, PublicKey};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

/// Own pending state plus one mirror state per known peer, all behind a
/// single mutex. Critical sections are pure map work; no I/O happens
/// under the lock.
///
/// Peer states track what we believe a peer has already seen, so gossip
/// diffs stay small; they are an optimization, own state is the truth.
pub struct MstStorage {
    completer: Arc<dyn Completer>,
    inner: Mutex<Inner>,
}

struct Inner {
    own: MstState,
    peer_states: HashMap<PublicKey, MstState>,
}

impl MstStorage {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        let own = MstState::empty(Arc::clone(&completer));
        Self { completer, inner: Mutex::new(Inner { own, peer_states: HashMap::new() }) }
    }

    /// Fold a locally submitted batch into own state.
    pub fn update_own(&self, batch: Batch) -> StateUpdateResult {
        self.inner.lock().own.insert(batch)
    }

    /// Fold a peer's transferred batches into that peer's mirror state,
    /// then into own state. The returned result reflects own state: it is
    /// what drives completion and update notifications.
    pub fn apply(&self, peer: PublicKey, batches: Vec<Batch>) -> StateUpdateResult {
        let mut inner = self.inner.lock();
        let peer_state = inner
            .peer_states
            .entry(peer)
            .or_insert_with(|| MstState::empty(Arc::clone(&self.completer)));
        for batch in &batches {
            peer_state.insert(batch.clone());
        }
        let mut combined = StateUpdateResult::default();
        for batch in batches {
            combined.absorb(inner.own.insert(batch));
        }
        combined
    }

    /// Own state minus what the peer already holds, with batches expired
    /// at `now_ms` left out.
    pub fn diff_state(&self, peer: &PublicKey, now_ms: u64) -> Vec<Batch> {
        let inner = self.inner.lock();
        let diff = match inner.peer_states.get(peer) {
            Some(peer_state) => inner.own.diff(peer_state),
            None => inner.own.clone(),
        };
        diff.batches()
            .filter(|batch| !self.completer.is_expired(batch, now_ms))
            .cloned()
            .collect()
    }

    /// Remove and return every expired batch from own state.
    pub fn extract_expired(&self, now_ms: u64) -> Vec<Batch> {
        self.inner.lock().own.erase_expired(now_ms)
    }

    /// Batches of `other` that own state has not seen.
    pub fn whats_new(&self, other: &[Batch]) -> Vec<Batch> {
        let inner = self.inner.lock();
        other
            .iter()
            .filter(|batch| !inner.own.contains(&batch.identity()))
            .cloned()
            .collect()
    }

    pub fn contains_batch(&self, batch: &Batch) -> bool {
        self.inner.lock().own.contains(&batch.identity())
    }

    /// Number of batches pending in own state.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().own.len()
    }
}
