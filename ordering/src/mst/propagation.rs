// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use basalt_ordering_types::Peer;
use rand::seq::SliceRandom;

/// Picks the destinations of one gossip emission from the current
/// ledger peer set. The processor drives the cadence; the strategy only
/// chooses who hears from us this time.
pub trait PropagationStrategy: Send + Sync {
    fn select_peers(&self, peers: &[Peer]) -> Vec<Peer>;
}

/// Uniform random fan-out of a fixed size. With `amount_per_once` peers
/// per emission the whole network converges in expectation within a few
/// intervals while per-tick traffic stays flat.
pub struct GossipPropagationStrategy {
    amount_per_once: usize,
}

impl GossipPropagationStrategy {
    pub fn new(amount_per_once: usize) -> Self {
        Self { amount_per_once }
    }
}

impl PropagationStrategy for GossipPropagationStrategy {
    fn select_peers(&self, peers: &[Peer]) -> Vec<Peer> {
        peers
            .choose_multiple(&mut rand::thread_rng(), self.amount_per_once)
            .cloned()
            .collect()
    }
}
