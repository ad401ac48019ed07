// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    config::OrderingConfig,
    counters,
    mst::{propagation::PropagationStrategy, state::StateUpdateResult, storage::MstStorage},
    network::MstStateSender,
    util::time_service::TimeService,
};
use basalt_ordering_types::{
    batch::BatchIdentity, message::MstStateMessage, Batch, Peer, PublicKey,
};
use lru::LruCache;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "processor_test.rs"]
mod processor_test;

/// Identities remembered to keep completion hand-off exactly-once even
/// when peers resend batches we already finished.
const COMPLETED_SEEN_CAPACITY: usize = 4_096;

/// Downstream channels the processor feeds.
///
/// `prepared`, `state_updates` and `expired` drive status publication;
/// `relay` hands each newly completed batch toward the ordering gate,
/// exactly once.
pub struct MstOutputs {
    pub state_updates: mpsc::UnboundedSender<Vec<Batch>>,
    pub prepared: mpsc::UnboundedSender<Batch>,
    pub expired: mpsc::UnboundedSender<Batch>,
    pub relay: mpsc::UnboundedSender<Batch>,
}

/// Gossip driver of MST aggregation.
///
/// One task owns this value: it folds locally submitted batches and
/// inbound peer states into [`MstStorage`], periodically ships diffs to a
/// random peer subset, and publishes completion / update / expiration
/// downstream. Transport failures are logged, never retried; the next
/// gossip tick resends whatever remains in the diff.
pub struct MstProcessor {
    own_key: PublicKey,
    storage: Arc<MstStorage>,
    sender: Arc<dyn MstStateSender>,
    time: Arc<dyn TimeService>,
    peers: watch::Receiver<Vec<Peer>>,
    strategy: Arc<dyn PropagationStrategy>,
    gossip_interval: Duration,
    expiration_ms: u64,
    completed_seen: LruCache<BatchIdentity, ()>,
    outputs: MstOutputs,
}

impl MstProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        own_key: PublicKey,
        storage: Arc<MstStorage>,
        sender: Arc<dyn MstStateSender>,
        time: Arc<dyn TimeService>,
        peers: watch::Receiver<Vec<Peer>>,
        strategy: Arc<dyn PropagationStrategy>,
        config: &OrderingConfig,
        outputs: MstOutputs,
    ) -> Self {
        Self {
            own_key,
            storage,
            sender,
            time,
            peers,
            strategy,
            gossip_interval: config.gossip_interval(),
            expiration_ms: config.mst.expiration_ms,
            completed_seen: LruCache::new(COMPLETED_SEEN_CAPACITY),
            outputs,
        }
    }

    pub async fn run(
        mut self,
        mut local_batches: mpsc::UnboundedReceiver<Batch>,
        mut peer_states: mpsc::Receiver<MstStateMessage>,
    ) {
        let mut gossip = tokio::time::interval(self.gossip_interval);
        gossip.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                maybe_batch = local_batches.recv() => match maybe_batch {
                    Some(batch) => self.handle_local_batch(batch),
                    None => break,
                },
                maybe_state = peer_states.recv() => match maybe_state {
                    Some(message) => self.handle_peer_state(message),
                    None => break,
                },
                _ = gossip.tick() => self.propagate().await,
            }
        }
        info!("mst processor stopped");
    }

    fn handle_local_batch(&mut self, batch: Batch) {
        if batch.is_expired(self.time.now_ms(), self.expiration_ms) {
            // already stale at first touch: expired, never completed
            counters::MST_EXPIRED_BATCHES.inc();
            let _ = self.outputs.expired.send(batch);
            return;
        }
        debug!(batch = ?batch, "folding local batch into mst state");
        let update = self.storage.update_own(batch);
        self.publish(update);
        self.sweep_expired();
    }

    fn handle_peer_state(&mut self, message: MstStateMessage) {
        let now_ms = self.time.now_ms();
        let source = message.source;
        let mut batches = message.batches;
        // entries already expired by the local clock never enter state
        batches.retain(|batch| !batch.is_expired(now_ms, self.expiration_ms));
        if batches.is_empty() {
            return;
        }
        info!(source = %source, batches = batches.len(), "applying mst state from peer");
        let update = self.storage.apply(source, batches);
        self.publish(update);
        self.sweep_expired();
    }

    async fn propagate(&mut self) {
        let now_ms = self.time.now_ms();
        let peers = self.peers.borrow().clone();
        let candidates: Vec<Peer> =
            peers.into_iter().filter(|peer| peer.public_key != self.own_key).collect();
        if candidates.is_empty() {
            return;
        }
        for peer in self.strategy.select_peers(&candidates) {
            let diff = self.storage.diff_state(&peer.public_key, now_ms);
            if diff.is_empty() {
                continue;
            }
            debug!(peer = %peer.public_key, batches = diff.len(), "propagating mst diff");
            let message = MstStateMessage { source: self.own_key, batches: diff };
            if let Err(error) = self.sender.send_state(&peer, message).await {
                warn!(peer = %peer.public_key, error = %error, "mst state transfer failed");
            }
        }
    }

    fn publish(&mut self, update: StateUpdateResult) {
        if !update.updated.is_empty() {
            let _ = self.outputs.state_updates.send(update.updated);
        }
        for batch in update.completed {
            if self.completed_seen.put(batch.identity(), ()).is_some() {
                // a peer resent a batch we already finished
                debug!(batch = ?batch, "ignoring re-completed batch");
                continue;
            }
            counters::MST_COMPLETED_BATCHES.inc();
            let _ = self.outputs.prepared.send(batch.clone());
            let _ = self.outputs.relay.send(batch);
        }
        counters::MST_PENDING_BATCHES.set(self.storage.pending_count() as i64);
    }

    fn sweep_expired(&mut self) {
        for batch in self.storage.extract_expired(self.time.now_ms()) {
            counters::MST_EXPIRED_BATCHES.inc();
            let _ = self.outputs.expired.send(batch);
        }
        counters::MST_PENDING_BATCHES.set(self.storage.pending_count() as i64);
    }
}
