// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    counters,
    presence_cache::PresenceReader,
    util::time_service::TimeService,
};
use basalt_ordering_types::{Batch, HashValue, Proposal, Round, FIRST_REJECT_ROUND};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};
use tracing::{debug, info};

#[cfg(test)]
#[path = "ordering_service_test.rs"]
mod ordering_service_test;

/// On-demand ordering service: accepts batches for the open rounds, packs
/// them into proposals as rounds close, and serves proposal requests.
///
/// `on_batches` and `on_request_proposal` take the shared lock;
/// `on_collaboration_outcome` is the single exclusive-lock writer and the
/// only place rounds open, close or get evicted.
pub struct OrderingService {
    transaction_limit: usize,
    number_of_proposals: usize,
    presence: Arc<dyn PresenceReader>,
    time: Arc<dyn TimeService>,
    inner: RwLock<ServiceState>,
}

#[derive(Default)]
struct ServiceState {
    /// Batch queues of the rounds currently accepting batches. The inner
    /// mutex lets `on_batches` append under the shared outer lock.
    current_rounds: HashMap<Round, Mutex<Vec<Batch>>>,
    /// Packed proposals, servable until evicted.
    proposal_map: HashMap<Round, Proposal>,
    /// Rounds with packed proposals in insertion order; the eviction
    /// queue.
    round_queue: VecDeque<Round>,
}

impl OrderingService {
    /// The initial round behaves like a freshly decided outcome: it opens
    /// the rounds reachable from it, so batches can flow before the first
    /// real round switch arrives.
    pub fn new(
        transaction_limit: usize,
        number_of_proposals: usize,
        presence: Arc<dyn PresenceReader>,
        time: Arc<dyn TimeService>,
        initial_round: Round,
    ) -> Self {
        let service = Self {
            transaction_limit,
            number_of_proposals,
            presence,
            time,
            inner: RwLock::new(ServiceState::default()),
        };
        service.on_collaboration_outcome(initial_round);
        service
    }

    /// Append batches to an open round's queue. Batches for closed or
    /// not-yet-open rounds are dropped silently: they either lost a race
    /// with a round switch or target a future this node cannot see yet.
    /// Batches the ledger already processed are dropped as well.
    pub fn on_batches(&self, round: Round, batches: Vec<Batch>) {
        let admitted: Vec<Batch> =
            batches.into_iter().filter(|batch| !self.batch_already_processed(batch)).collect();

        let inner = self.inner.read();
        let queue = match inner.current_rounds.get(&round) {
            Some(queue) => queue,
            None => {
                debug!(round = %round, "dropping batches for a round that is not open");
                return;
            }
        };
        let mut queue = queue.lock();
        debug!(round = %round, batches = admitted.len(), "queueing batches");
        queue.extend(admitted);
    }

    /// Serve a packed proposal, if this node still retains one for the
    /// round.
    pub fn on_request_proposal(&self, round: Round) -> Option<Proposal> {
        let proposal = self.inner.read().proposal_map.get(&round).cloned();
        debug!(round = %round, found = proposal.is_some(), "proposal request");
        proposal
    }

    /// Advance to `round`. Packs the two rounds that `round` makes
    /// unreachable for new batches and reopens the rounds reachable from
    /// it:
    ///
    /// ```text
    ///     reject case, round (b, r):      commit case, round (b, 1):
    ///       close (b, r+1)                  close (b, 2) and (b+1, 1)
    ///       open  (b, r+2)                  open  (b, 3) (b+1, 2) (b+2, 1)
    /// ```
    ///
    /// The reopened diagonal is exactly the set of rounds the connection
    /// manager routes batches to while the node sits in `round`.
    pub fn on_collaboration_outcome(&self, round: Round) {
        info!(round = %round, "collaboration outcome");
        let mut inner = self.inner.write();

        self.close_round(&mut inner, round.next_reject());
        if round.reject_round == FIRST_REJECT_ROUND {
            self.close_round(&mut inner, round.next_commit());
            inner.current_rounds.clear();
            for advance in 0..=2u32 {
                let reopened = Round::new(
                    round.block_round + u64::from(advance),
                    round.reject_round + 2 - advance,
                );
                inner.current_rounds.entry(reopened).or_default();
            }
        } else {
            inner
                .current_rounds
                .entry(Round::new(round.block_round, round.reject_round + 2))
                .or_default();
        }

        while inner.round_queue.len() > self.number_of_proposals {
            if let Some(evicted) = inner.round_queue.pop_front() {
                inner.proposal_map.remove(&evicted);
                info!(round = %evicted, "evicted oldest proposal");
            }
        }
    }

    fn close_round(&self, inner: &mut ServiceState, round: Round) {
        let queue = match inner.current_rounds.remove(&round) {
            Some(queue) => queue.into_inner(),
            None => return,
        };
        if queue.is_empty() {
            return;
        }
        let proposal = self.pack_proposal(round, queue);
        info!(round = %round, txns = proposal.len(), "packed proposal");
        counters::PROPOSAL_TXNS.observe(proposal.len() as f64);
        inner.proposal_map.insert(round, proposal);
        inner.round_queue.push_back(round);
    }

    /// Drain the queue into a proposal: batches in arrival order, each
    /// identity admitted once, stopping once the transaction limit is
    /// reached. Whatever remains in the queue is dropped; resubmission
    /// is the gate cache's business.
    fn pack_proposal(&self, round: Round, queue: Vec<Batch>) -> Proposal {
        let mut seen: HashSet<Vec<HashValue>> = HashSet::new();
        let mut transactions = Vec::new();
        for batch in queue {
            if transactions.len() >= self.transaction_limit {
                break;
            }
            if !seen.insert(batch.identity()) {
                continue;
            }
            transactions.extend_from_slice(batch.transactions());
        }
        Proposal::new(round.block_round, self.time.now_ms(), transactions)
    }

    fn batch_already_processed(&self, batch: &Batch) -> bool {
        match self.presence.check_batch(batch) {
            Ok(statuses) => {
                let processed = statuses.iter().any(|status| status.is_already_processed());
                if processed {
                    debug!(batch = ?batch, "dropping batch already recorded in the ledger");
                }
                processed
            }
            // the gate-side filter is authoritative; admit on store failure
            Err(_) => false,
        }
    }
}
