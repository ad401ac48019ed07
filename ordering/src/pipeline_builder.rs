// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    batch_cache::BatchCache,
    config::OrderingConfig,
    connection_manager::ConnectionManager,
    events::{CommitNotification, OrderingEvent, RoundSwitch, VerifiedProposalOutcome},
    mst::{
        processor::{MstOutputs, MstProcessor},
        propagation::GossipPropagationStrategy,
        relay::run_relay,
        state::DefaultCompleter,
        storage::MstStorage,
    },
    network::{MstStateSender, OrderingServer, PeerClientFactory},
    ordering_gate::OrderingGate,
    ordering_service::OrderingService,
    presence_cache::{PresenceBackend, PresenceReader, StoragePresenceCache},
    torii::{
        command_service::CommandService,
        status_bus::StatusBus,
        status_processor::{run_status_processor, StatusStreams},
    },
    util::time_service::TimeService,
};
use basalt_ordering_types::{
    message::MstStateMessage, HashValue, LedgerState, PublicKey, Round,
};
use std::sync::Arc;
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::info;

/// External collaborators and bootstrap data the pipeline is built from.
pub struct PipelineDeps {
    pub own_key: PublicKey,
    pub time: Arc<dyn TimeService>,
    pub presence_backend: Arc<dyn PresenceBackend>,
    pub peer_factory: Arc<dyn PeerClientFactory>,
    pub mst_sender: Arc<dyn MstStateSender>,
    pub initial_round: Round,
    pub initial_ledger_state: LedgerState,
    /// Permutation seeds standing in for the hashes of the three blocks
    /// before genesis, oldest first.
    pub initial_seed_hashes: [HashValue; 3],
}

/// A fully wired ordering pipeline: the long-lived components plus the
/// input channels the surrounding node feeds.
///
/// Inputs: `round_switches` from the synchronizer, `verified_proposals`
/// from the stateful validator, `peer_states` from the MST transport
/// server. Outputs: ordering events (via [`OrderingPipeline::subscribe_ordering_events`])
/// and the status bus.
pub struct OrderingPipeline {
    pub command_service: Arc<CommandService>,
    pub ordering_service: Arc<OrderingService>,
    pub ordering_gate: Arc<OrderingGate>,
    pub connection_manager: Arc<ConnectionManager>,
    pub status_bus: StatusBus,
    pub round_switches: mpsc::Sender<RoundSwitch>,
    pub verified_proposals: mpsc::Sender<VerifiedProposalOutcome>,
    pub peer_states: mpsc::Sender<MstStateMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl OrderingPipeline {
    pub fn build(config: &OrderingConfig, deps: PipelineDeps) -> Self {
        let presence: Arc<dyn PresenceReader> = Arc::new(StoragePresenceCache::new(
            deps.presence_backend,
            config.status_cache_capacity,
        ));

        let (status_bus, bus_task) =
            StatusBus::start(config.channel_capacity, config.status_cache_capacity);

        let ordering_service = Arc::new(OrderingService::new(
            config.transaction_limit,
            config.number_of_proposals,
            Arc::clone(&presence),
            Arc::clone(&deps.time),
            deps.initial_round,
        ));
        let connection_manager = Arc::new(ConnectionManager::new(
            Arc::clone(&deps.peer_factory),
            deps.initial_round,
            deps.initial_ledger_state.peers.clone(),
            deps.initial_seed_hashes,
        ));
        let batch_cache = Arc::new(BatchCache::new());
        let ordering_gate = Arc::new(OrderingGate::new(
            config.transaction_limit,
            config.proposal_request_timeout(),
            config.channel_capacity,
            Arc::clone(&ordering_service),
            Arc::clone(&connection_manager),
            batch_cache,
            Arc::clone(&presence),
            Arc::clone(&deps.time),
            deps.initial_round,
        ));

        // pipeline plumbing
        let (state_updates_tx, state_updates_rx) = mpsc::unbounded_channel();
        let (prepared_tx, prepared_rx) = mpsc::unbounded_channel();
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (local_batches_tx, local_batches_rx) = mpsc::unbounded_channel();
        let (commits_tx, commits_rx) = mpsc::unbounded_channel();
        let (gate_ingest_tx, mut gate_ingest_rx) = mpsc::channel(config.channel_capacity);
        let (peer_states_tx, peer_states_rx) = mpsc::channel(config.channel_capacity);
        let (verified_tx, verified_rx) = mpsc::channel(config.channel_capacity);
        let (round_tx, mut round_rx) = mpsc::channel::<RoundSwitch>(config.channel_capacity);
        let (peers_watch_tx, peers_watch_rx) =
            watch::channel(deps.initial_ledger_state.peers.clone());

        let storage = Arc::new(MstStorage::new(Arc::new(DefaultCompleter::new(
            config.mst.expiration_ms,
        ))));
        let mst_processor = MstProcessor::new(
            deps.own_key,
            storage,
            Arc::clone(&deps.mst_sender),
            Arc::clone(&deps.time),
            peers_watch_rx,
            Arc::new(GossipPropagationStrategy::new(config.mst.gossip_amount_per_once)),
            config,
            MstOutputs {
                state_updates: state_updates_tx,
                prepared: prepared_tx,
                expired: expired_tx,
                relay: relay_tx,
            },
        );

        let command_service = Arc::new(CommandService::new(
            Arc::clone(&presence),
            status_bus.clone(),
            Arc::clone(&deps.time),
            config.stale_stream_timeout(),
            config.status_cache_capacity,
            local_batches_tx,
            gate_ingest_tx.clone(),
        ));

        let mut tasks = vec![bus_task, command_service.spawn_cache_updater()];
        tasks.push(tokio::spawn(mst_processor.run(local_batches_rx, peer_states_rx)));
        tasks.push(tokio::spawn(run_relay(relay_rx, gate_ingest_tx, config.relay_capacity)));
        tasks.push(tokio::spawn(run_status_processor(
            status_bus.clone(),
            StatusStreams {
                state_updates: state_updates_rx,
                prepared: prepared_rx,
                expired: expired_rx,
                verified: verified_rx,
                commits: commits_rx,
            },
        )));

        // completed batches drain into the gate one by one
        let ingest_gate = Arc::clone(&ordering_gate);
        tasks.push(tokio::spawn(async move {
            while let Some(batch) = gate_ingest_rx.recv().await {
                ingest_gate.propagate_batch(batch).await;
            }
        }));

        // the round task serializes the cycle: roles first, then the
        // gate, with commit fallout forked off to status publication
        let cycle_gate = Arc::clone(&ordering_gate);
        let cycle_manager = Arc::clone(&connection_manager);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = round_rx.recv().await {
                cycle_manager.on_round_switch(&event);
                let _ = peers_watch_tx.send(event.ledger_state.peers.clone());
                let _ = commits_tx.send(CommitNotification::from(&event));
                cycle_gate.on_round_switch(event).await;
            }
            info!("round cycle stopped");
        }));

        Self {
            command_service,
            ordering_service,
            ordering_gate,
            connection_manager,
            status_bus,
            round_switches: round_tx,
            verified_proposals: verified_tx,
            peer_states: peer_states_tx,
            tasks,
        }
    }

    /// Ordering events as emitted by the gate, one per round switch.
    pub fn subscribe_ordering_events(&self) -> broadcast::Receiver<OrderingEvent> {
        self.ordering_gate.subscribe()
    }

    /// Server half of the peer RPCs, for the host to mount on its RPC
    /// substrate.
    pub fn ordering_server(&self) -> OrderingServer {
        OrderingServer::new(Arc::clone(&self.ordering_service))
    }

    /// Abort every pipeline task. In-flight work is discarded.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
