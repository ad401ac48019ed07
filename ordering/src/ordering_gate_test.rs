// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use super::OrderingGate;
use crate::{
    batch_cache::BatchCache,
    connection_manager::ConnectionManager,
    events::RoundSwitch,
    ordering_service::OrderingService,
    test_utils::{
        atomic_batch, signed_tx, singleton_batch, test_peer, ClientBehavior,
        MemoryPresenceBackend, RecordingClientFactory,
    },
    util::time_service::SimulatedTimeService,
};
use basalt_ordering_types::{
    Batch, HashValue, LedgerState, Peer, Proposal, Round, Transaction,
};
use claims::{assert_none, assert_some};
use std::{sync::Arc, time::Duration};

const NOW_MS: u64 = 5_000_000;
const INITIAL_ROUND: Round = Round::new(2, 1);
const TRANSACTION_LIMIT: usize = 10;

struct Harness {
    gate: Arc<OrderingGate>,
    factory: Arc<RecordingClientFactory>,
    presence: Arc<MemoryPresenceBackend>,
    cache: Arc<BatchCache>,
    peer: Peer,
}

fn harness() -> Harness {
    let presence = Arc::new(MemoryPresenceBackend::default());
    let time = Arc::new(SimulatedTimeService::new(NOW_MS));
    let factory = Arc::new(RecordingClientFactory::default());
    let peer = test_peer(1);
    let cache = Arc::new(BatchCache::new());

    let service = Arc::new(OrderingService::new(
        TRANSACTION_LIMIT,
        3,
        presence.clone(),
        time.clone(),
        INITIAL_ROUND,
    ));
    let network = Arc::new(ConnectionManager::new(
        factory.clone(),
        INITIAL_ROUND,
        vec![peer.clone()],
        [HashValue::from_u8(1), HashValue::from_u8(2), HashValue::from_u8(3)],
    ));
    let gate = Arc::new(OrderingGate::new(
        TRANSACTION_LIMIT,
        Duration::from_millis(100),
        16,
        service,
        network,
        cache.clone(),
        presence.clone(),
        time,
        INITIAL_ROUND,
    ));
    Harness { gate, factory, presence, cache, peer }
}

fn ledger_state(peer: &Peer) -> LedgerState {
    LedgerState::new(2, HashValue::from_u8(7), vec![peer.clone()])
}

fn batch(tag: u8) -> Batch {
    singleton_batch(signed_tx("gate@basalt", 1, &[tag], NOW_MS - 100 + tag as u64))
}

#[tokio::test]
async fn propagate_adds_to_cache_and_forwards() {
    let h = harness();
    let b = batch(1);
    h.gate.propagate_batch(b.clone()).await;

    assert_eq!(h.cache.tail(), vec![b]);
    // one batch fanned out to the three consumer rounds of (2,1)
    let rounds: Vec<Round> =
        h.factory.client(&h.peer.public_key).sent_batches().into_iter().map(|(r, _)| r).collect();
    assert_eq!(rounds, vec![Round::new(2, 3), Round::new(3, 2), Round::new(4, 1)]);
}

#[tokio::test]
async fn round_switch_emits_the_issuers_proposal() {
    let h = harness();
    let client = h.factory.client(&h.peer.public_key);
    let proposal = Proposal::new(3, NOW_MS, batch(1).transactions().to_vec());
    client.set_proposal(Some(proposal.clone()));

    let mut events = h.gate.subscribe();
    h.gate
        .on_round_switch(RoundSwitch::commit(Round::new(3, 1), ledger_state(&h.peer), vec![], vec![]))
        .await;

    let event = events.recv().await.unwrap();
    assert_eq!(event.round, Round::new(3, 1));
    assert_eq!(assert_some!(event.proposal), proposal);
    assert_eq!(h.gate.current_round(), Round::new(3, 1));
    assert_eq!(client.proposal_requests(), vec![Round::new(3, 1)]);
}

#[tokio::test]
async fn replayed_atomic_batch_is_stripped_whole() {
    let h = harness();
    let committed_pair = atomic_batch(vec![
        signed_tx("gate@basalt", 1, &[1], NOW_MS - 50),
        signed_tx("gate@basalt", 1, &[2], NOW_MS - 49),
    ]);
    let fresh = batch(9);

    // one member of the pair is already on the ledger
    h.presence.mark_committed(committed_pair.tx_hashes()[0]);

    let mut txs: Vec<Transaction> = committed_pair.transactions().to_vec();
    txs.extend(fresh.transactions().iter().cloned());
    let client = h.factory.client(&h.peer.public_key);
    client.set_proposal(Some(Proposal::new(3, NOW_MS, txs)));

    let mut events = h.gate.subscribe();
    h.gate
        .on_round_switch(RoundSwitch::commit(Round::new(3, 1), ledger_state(&h.peer), vec![], vec![]))
        .await;

    let event = events.recv().await.unwrap();
    let emitted = assert_some!(event.proposal);
    assert_eq!(emitted.height(), 3);
    assert_eq!(emitted.transactions(), fresh.transactions());
}

#[tokio::test]
async fn fully_replayed_proposal_is_discarded_but_the_round_advances() {
    let h = harness();
    let replayed = batch(1);
    h.presence.mark_rejected(replayed.tx_hashes()[0]);

    let client = h.factory.client(&h.peer.public_key);
    client.set_proposal(Some(Proposal::new(3, NOW_MS, replayed.transactions().to_vec())));

    let mut events = h.gate.subscribe();
    h.gate
        .on_round_switch(RoundSwitch::commit(Round::new(3, 1), ledger_state(&h.peer), vec![], vec![]))
        .await;

    let event = events.recv().await.unwrap();
    assert_none!(event.proposal);
    assert_eq!(h.gate.current_round(), Round::new(3, 1));
}

#[tokio::test]
async fn presence_failure_counts_as_replayed() {
    let h = harness();
    let client = h.factory.client(&h.peer.public_key);
    client.set_proposal(Some(Proposal::new(3, NOW_MS, batch(1).transactions().to_vec())));
    h.presence.set_failing(true);

    let mut events = h.gate.subscribe();
    h.gate
        .on_round_switch(RoundSwitch::commit(Round::new(3, 1), ledger_state(&h.peer), vec![], vec![]))
        .await;

    assert_none!(events.recv().await.unwrap().proposal);
}

#[tokio::test(start_paused = true)]
async fn unreachable_issuer_yields_an_empty_proposal() {
    let h = harness();
    h.factory.client(&h.peer.public_key).set_behavior(ClientBehavior::Hang);

    let mut events = h.gate.subscribe();
    h.gate
        .on_round_switch(RoundSwitch::commit(Round::new(3, 1), ledger_state(&h.peer), vec![], vec![]))
        .await;

    let event = events.recv().await.unwrap();
    let proposal = assert_some!(event.proposal);
    assert_eq!(proposal.height(), 3);
    assert!(proposal.is_empty());
}

#[tokio::test]
async fn transport_failure_yields_an_empty_proposal() {
    let h = harness();
    h.factory.client(&h.peer.public_key).set_behavior(ClientBehavior::Fail);

    let mut events = h.gate.subscribe();
    h.gate
        .on_round_switch(RoundSwitch::reject(Round::new(2, 2), ledger_state(&h.peer)))
        .await;

    let event = events.recv().await.unwrap();
    let proposal = assert_some!(event.proposal);
    assert_eq!(proposal.height(), 2);
    assert!(proposal.is_empty());
}

#[tokio::test]
async fn cached_batches_are_resent_on_the_third_switch() {
    let h = harness();
    let b = batch(1);
    h.gate.propagate_batch(b.clone()).await;
    let client = h.factory.client(&h.peer.public_key);
    let baseline = client.sent_batches().len();

    let mut round = INITIAL_ROUND;
    for _ in 0..2 {
        round = round.next_reject();
        h.gate.on_round_switch(RoundSwitch::reject(round, ledger_state(&h.peer))).await;
    }
    assert_eq!(client.sent_batches().len(), baseline);

    round = round.next_reject();
    h.gate.on_round_switch(RoundSwitch::reject(round, ledger_state(&h.peer))).await;

    let resent: Vec<(Round, Vec<Batch>)> = client.sent_batches().split_off(baseline);
    assert_eq!(resent.len(), 3);
    assert!(resent.iter().all(|(_, batches)| batches == &vec![b.clone()]));
    assert_eq!(resent[0].0, Round::new(2, 6));
}

#[tokio::test]
async fn resend_respects_the_transaction_limit() {
    let h = harness();
    // eleven single-transaction batches against a limit of ten
    for tag in 0..=10u8 {
        h.gate.propagate_batch(batch(tag)).await;
    }
    let client = h.factory.client(&h.peer.public_key);
    let baseline = client.sent_batches().len();

    let mut round = INITIAL_ROUND;
    for _ in 0..3 {
        round = round.next_reject();
        h.gate.on_round_switch(RoundSwitch::reject(round, ledger_state(&h.peer))).await;
    }

    let resent = client.sent_batches().split_off(baseline);
    let total: usize =
        resent.iter().map(|(_, batches)| batches.iter().map(Batch::len).sum::<usize>()).sum();
    assert_eq!(total, 3 * TRANSACTION_LIMIT);
}

#[tokio::test]
async fn committed_hashes_evict_cached_batches() {
    let h = harness();
    let b = batch(1);
    h.gate.propagate_batch(b.clone()).await;
    assert!(!h.cache.is_empty());

    h.gate
        .on_round_switch(RoundSwitch::commit(
            Round::new(3, 1),
            ledger_state(&h.peer),
            b.tx_hashes(),
            vec![],
        ))
        .await;
    assert!(h.cache.is_empty());
}
