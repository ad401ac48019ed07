// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    batch_cache::BatchCache,
    connection_manager::ConnectionManager,
    counters,
    events::{OrderingEvent, RoundSwitch},
    ordering_service::OrderingService,
    presence_cache::PresenceReader,
    util::time_service::TimeService,
};
use basalt_ordering_types::{
    batch::parse_batches, Batch, PresenceStatus, Proposal, Round, Transaction,
};
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "ordering_gate_test.rs"]
mod ordering_gate_test;

/// Client-facing front of the ordering pipeline.
///
/// Accepts locally originated batches, drives the per-round cycle on
/// every round switch, and emits the proposal to vote on. One task calls
/// [`OrderingGate::on_round_switch`] at a time, so the five steps of the
/// cycle are serialized per event.
pub struct OrderingGate {
    transaction_limit: usize,
    proposal_request_timeout: Duration,
    ordering_service: Arc<OrderingService>,
    network: Arc<ConnectionManager>,
    cache: Arc<BatchCache>,
    presence: Arc<dyn PresenceReader>,
    time: Arc<dyn TimeService>,
    current_round: RwLock<Round>,
    events: broadcast::Sender<OrderingEvent>,
}

impl OrderingGate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_limit: usize,
        proposal_request_timeout: Duration,
        events_capacity: usize,
        ordering_service: Arc<OrderingService>,
        network: Arc<ConnectionManager>,
        cache: Arc<BatchCache>,
        presence: Arc<dyn PresenceReader>,
        time: Arc<dyn TimeService>,
        initial_round: Round,
    ) -> Self {
        let (events, _) = broadcast::channel(events_capacity);
        Self {
            transaction_limit,
            proposal_request_timeout,
            ordering_service,
            network,
            cache,
            presence,
            time,
            current_round: RwLock::new(initial_round),
            events,
        }
    }

    /// Ordering events, one per round switch. Late subscribers only see
    /// events emitted after they subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderingEvent> {
        self.events.subscribe()
    }

    pub fn current_round(&self) -> Round {
        *self.current_round.read()
    }

    /// Take a batch under local custody and send it toward the three
    /// possible future proposers. The cache keeps resending it on
    /// upcoming rounds until a commit settles it or it ages out of the
    /// three slots.
    pub async fn propagate_batch(&self, batch: Batch) {
        self.cache.add_to_back([batch.clone()]);
        let round = self.current_round();
        debug!(round = %round, batch = ?batch, "propagating batch");
        self.network.on_batches(round, vec![batch]).await;
    }

    /// One full round cycle, in order: settle commit fallout in the
    /// cache, advance the ordering service, resend cached batches,
    /// request the round's proposal, strip replays, emit.
    pub async fn on_round_switch(&self, event: RoundSwitch) {
        let round = event.next_round;
        info!(round = %round, outcome = ?event.outcome, "round switch");

        let processed = event.processed_hashes();
        if !processed.is_empty() {
            debug!(hashes = processed.len(), "removing settled transactions from the cache");
            self.cache.remove(&processed);
        }

        *self.current_round.write() = round;
        self.ordering_service.on_collaboration_outcome(round);
        self.resend_cached_batches(round).await;

        let proposal = self.request_proposal(round).await;
        counters::ORDERING_EVENTS_EMITTED.inc();
        let _ = self.events.send(OrderingEvent {
            proposal,
            round,
            ledger_state: event.ledger_state,
        });
    }

    /// Rotate the cache and resend the head slot, up to one proposal's
    /// worth of transactions.
    async fn resend_cached_batches(&self, round: Round) {
        let batches = self.cache.pop();
        self.cache.add_to_back(batches.clone());

        let mut budget = self.transaction_limit;
        let mut resend = Vec::new();
        for batch in batches {
            if batch.len() > budget {
                break;
            }
            budget -= batch.len();
            resend.push(batch);
        }
        if resend.is_empty() {
            return;
        }
        debug!(round = %round, batches = resend.len(), "resending cached batches");
        self.network.on_batches(round, resend).await;
    }

    /// Ask the issuer for the proposal, bounded by the request deadline.
    /// Timeouts and transport failures yield an empty proposal; the
    /// round advances regardless of any single peer.
    async fn request_proposal(&self, round: Round) -> Option<Proposal> {
        let request = self.network.on_request_proposal(round);
        match tokio::time::timeout(self.proposal_request_timeout, request).await {
            Ok(Ok(Some(proposal))) => self.strip_replays(proposal),
            Ok(Ok(None)) => {
                debug!(round = %round, "issuer has no proposal for the round");
                None
            }
            Ok(Err(error)) => {
                counters::PROPOSAL_REQUESTS_FAILED.inc();
                warn!(round = %round, error = %error, "proposal request failed, voting on an empty proposal");
                Some(Proposal::empty(round.block_round, self.time.now_ms()))
            }
            Err(_) => {
                counters::PROPOSAL_REQUESTS_FAILED.inc();
                warn!(round = %round, timeout = ?self.proposal_request_timeout, "proposal request timed out, voting on an empty proposal");
                Some(Proposal::empty(round.block_round, self.time.now_ms()))
            }
        }
    }

    /// Drop every batch with a transaction the ledger already settled,
    /// the whole batch, so atomic groups never commit partially. A
    /// presence lookup failure counts as settled: losing a transaction
    /// beats double-committing one.
    fn strip_replays(&self, proposal: Proposal) -> Option<Proposal> {
        if proposal.is_empty() {
            return None;
        }
        let groups = parse_batches(proposal.transactions());
        let verdicts: Vec<bool> = groups.iter().map(|group| self.group_is_fresh(group)).collect();

        if verdicts.iter().all(|fresh| *fresh) {
            return Some(proposal);
        }

        let replayed: usize = groups
            .iter()
            .zip(verdicts.iter())
            .filter(|(_, fresh)| !**fresh)
            .map(|(group, _)| group.len())
            .sum();
        counters::REPLAYED_TXNS_STRIPPED.inc_by(replayed as u64);
        info!(
            height = proposal.height(),
            replayed,
            dropped_batches = verdicts.iter().filter(|fresh| !**fresh).count(),
            "stripped replayed batches from proposal"
        );

        let kept: Vec<Transaction> = groups
            .into_iter()
            .zip(verdicts)
            .filter(|(_, fresh)| *fresh)
            .flat_map(|(group, _)| group.iter().cloned().collect::<Vec<_>>())
            .collect();
        if kept.is_empty() {
            return None;
        }
        Some(Proposal::new(proposal.height(), proposal.created_time_ms(), kept))
    }

    fn group_is_fresh(&self, group: &[Transaction]) -> bool {
        group.iter().all(|tx| {
            let hash = tx.hash();
            match self.presence.check(&hash) {
                Ok(PresenceStatus::Missing(_)) => true,
                Ok(status) => {
                    debug!(tx = %hash, status = ?status, "transaction already settled");
                    false
                }
                Err(error) => {
                    warn!(tx = %hash, error = %error, "presence lookup failed, dropping transaction");
                    false
                }
            }
        })
    }
}
