// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};

/// Count of ordering events emitted by the gate, empty proposals included.
pub static ORDERING_EVENTS_EMITTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_events_emitted",
        "Number of ordering events emitted by the ordering gate"
    )
    .unwrap()
});

/// Transactions per packed proposal.
pub static PROPOSAL_TXNS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "basalt_ordering_proposal_txns",
        "Number of transactions in proposals packed by the ordering service",
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0]
    )
    .unwrap()
});

/// Proposal requests that hit their deadline or failed in transport.
pub static PROPOSAL_REQUESTS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_proposal_requests_failed",
        "Proposal requests that timed out or failed in transport"
    )
    .unwrap()
});

/// Transactions stripped from proposals by the replay filter.
pub static REPLAYED_TXNS_STRIPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_replayed_txns_stripped",
        "Transactions removed from proposals because the ledger already processed them"
    )
    .unwrap()
});

/// Batches currently pending signature collection in the local MST state.
pub static MST_PENDING_BATCHES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "basalt_ordering_mst_pending_batches",
        "Batches pending signature collection in the local MST state"
    )
    .unwrap()
});

/// Batches that reached their signature quorum.
pub static MST_COMPLETED_BATCHES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_mst_completed_batches",
        "Batches that collected their full signature quorum"
    )
    .unwrap()
});

/// Batches dropped from MST state by expiration.
pub static MST_EXPIRED_BATCHES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_mst_expired_batches",
        "Batches dropped from MST state because every member aged out"
    )
    .unwrap()
});

/// Completed batches lost because the gate relay overflowed.
pub static RELAY_DROPPED_BATCHES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_relay_dropped_batches",
        "Completed batches dropped because the gate relay buffer overflowed"
    )
    .unwrap()
});

/// Statuses fanned out by the status bus worker.
pub static STATUSES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_statuses_published",
        "Transaction statuses fanned out by the status bus"
    )
    .unwrap()
});

/// Batches the command service silently dropped as already processed.
pub static ALREADY_PROCESSED_BATCHES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "basalt_ordering_already_processed_batches",
        "Submitted batches dropped because the ledger already processed a member"
    )
    .unwrap()
});
