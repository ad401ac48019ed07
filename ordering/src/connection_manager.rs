// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    error::TransportError,
    events::{RoundOutcome, RoundSwitch},
    network::{PeerClient, PeerClientFactory},
};
use basalt_ordering_types::{
    Batch, HashValue, Peer, Proposal, RejectRound, Round, FIRST_REJECT_ROUND,
};
use parking_lot::RwLock;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, warn};

#[cfg(test)]
#[path = "connection_manager_test.rs"]
mod connection_manager_test;

/// Permutation index of the peer consuming batches for the first reject
/// round of the next block round.
pub const NEXT_REJECT_ROUND_CONSUMER: RejectRound = FIRST_REJECT_ROUND + 1;

/// Permutation index of the peer consuming batches for the first commit
/// round two block rounds ahead.
pub const NEXT_COMMIT_ROUND_CONSUMER: RejectRound = FIRST_REJECT_ROUND;

/// Permutation index of the peer consuming batches for the further
/// reject rounds of the current block round.
pub fn current_reject_round_consumer(reject_round: RejectRound) -> RejectRound {
    reject_round + 2
}

/// Routes batches to the three peers that may propose them, and proposal
/// requests to the round's issuer.
///
/// Batches always travel two rounds ahead of the round they are submitted
/// in: the next reject round of the current block, the first reject round
/// of the next block, and the first commit round of the block after next.
/// Which concrete peer serves each of those futures comes from three
/// pseudo-random peer permutations, seeded by the hashes of the blocks
/// zero, one and two commits back, so every correct node derives the same
/// assignment without coordination.
pub struct ConnectionManager {
    factory: Arc<dyn PeerClientFactory>,
    inner: RwLock<RoleState>,
}

struct RoleState {
    current_round: Round,
    peers: Vec<Peer>,
    /// Commit hashes, oldest first; at most three retained.
    seed_window: VecDeque<HashValue>,
    /// Peer index permutations for the current, next and after-next
    /// block rounds.
    permutations: [Vec<usize>; 3],
    endpoints: Option<Endpoints>,
}

#[derive(Clone)]
struct Endpoints {
    current_reject_consumer: Arc<dyn PeerClient>,
    next_reject_consumer: Arc<dyn PeerClient>,
    next_commit_consumer: Arc<dyn PeerClient>,
    issuer: Arc<dyn PeerClient>,
}

impl ConnectionManager {
    /// `initial_seed_hashes` bootstrap the permutation seeds before any
    /// block commits, oldest first.
    pub fn new(
        factory: Arc<dyn PeerClientFactory>,
        initial_round: Round,
        initial_peers: Vec<Peer>,
        initial_seed_hashes: [HashValue; 3],
    ) -> Self {
        let mut state = RoleState {
            current_round: initial_round,
            peers: initial_peers,
            seed_window: initial_seed_hashes.into_iter().collect(),
            permutations: [Vec::new(), Vec::new(), Vec::new()],
            endpoints: None,
        };
        regenerate_permutations(&mut state);
        assign_endpoints(factory.as_ref(), &mut state);
        Self { factory, inner: RwLock::new(state) }
    }

    /// Reassign the role endpoints for the round being entered. Commit
    /// outcomes rotate the seed window and adopt the new ledger peer set,
    /// which regenerates all three permutations; reject outcomes only
    /// move the issuer and current-round consumer indexes. The swap is
    /// atomic: in-flight calls finish on the snapshot they took.
    pub fn on_round_switch(&self, event: &RoundSwitch) {
        let mut inner = self.inner.write();
        inner.current_round = event.next_round;
        if event.outcome == RoundOutcome::Commit {
            inner.seed_window.push_back(event.ledger_state.top_block_hash);
            while inner.seed_window.len() > 3 {
                inner.seed_window.pop_front();
            }
            inner.peers = event.ledger_state.peers.clone();
            regenerate_permutations(&mut inner);
        }
        assign_endpoints(self.factory.as_ref(), &mut inner);
    }

    /// Forward the batches to the three future-round consumers at their
    /// derived rounds. Transport failures are logged and swallowed: the
    /// gate cache resends on upcoming rounds.
    pub async fn on_batches(&self, round: Round, batches: Vec<Batch>) {
        let endpoints = match self.inner.read().endpoints.clone() {
            Some(endpoints) => endpoints,
            None => {
                warn!(round = %round, "no peers assigned, dropping outbound batches");
                return;
            }
        };
        let targets = [
            (
                endpoints.current_reject_consumer,
                Round::new(round.block_round, current_reject_round_consumer(round.reject_round)),
            ),
            (
                endpoints.next_reject_consumer,
                Round::new(round.block_round + 1, NEXT_REJECT_ROUND_CONSUMER),
            ),
            (
                endpoints.next_commit_consumer,
                Round::new(round.block_round + 2, NEXT_COMMIT_ROUND_CONSUMER),
            ),
        ];
        for (client, target_round) in targets {
            debug!(round = %target_round, batches = batches.len(), "forwarding batches");
            if let Err(error) = client.send_batches(target_round, batches.clone()).await {
                warn!(round = %target_round, error = %error, "batch forwarding failed");
            }
        }
    }

    /// Ask the current issuer for the round's proposal.
    pub async fn on_request_proposal(
        &self,
        round: Round,
    ) -> Result<Option<Proposal>, TransportError> {
        let issuer = match self.inner.read().endpoints.clone() {
            Some(endpoints) => endpoints.issuer,
            None => return Err(TransportError::NoPeers("issuer")),
        };
        debug!(round = %round, "requesting proposal from issuer");
        issuer.request_proposal(round).await
    }
}

fn regenerate_permutations(state: &mut RoleState) {
    let peer_count = state.peers.len();
    // the newest hash seeds the current-round permutation, the oldest
    // the round after next
    let mut seeds = state.seed_window.iter().rev();
    for permutation in state.permutations.iter_mut() {
        let seed = seeds.next().copied().unwrap_or_else(HashValue::zero);
        *permutation = shuffled_indices(&seed, peer_count);
    }
}

fn assign_endpoints(factory: &dyn PeerClientFactory, state: &mut RoleState) {
    if state.peers.is_empty() {
        warn!("ledger peer set is empty, ordering roles unassigned");
        state.endpoints = None;
        return;
    }
    let reject = state.current_round.reject_round;
    let client = |permutation: usize, index: RejectRound| {
        let order = &state.permutations[permutation];
        let peer = &state.peers[order[index as usize % order.len()]];
        factory.create(peer)
    };
    state.endpoints = Some(Endpoints {
        current_reject_consumer: client(0, current_reject_round_consumer(reject)),
        next_reject_consumer: client(1, NEXT_REJECT_ROUND_CONSUMER),
        next_commit_consumer: client(2, NEXT_COMMIT_ROUND_CONSUMER),
        issuer: client(0, reject),
    });
}

/// Deterministic pseudo-random permutation of `0..len`, seeded by a
/// block hash. Every correct node shuffles identically.
fn shuffled_indices(seed: &HashValue, len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = StdRng::from_seed(*seed.as_bytes());
    order.shuffle(&mut rng);
    order
}
