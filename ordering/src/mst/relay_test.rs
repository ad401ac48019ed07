// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use super::run_relay;
use crate::test_utils::{signed_tx, singleton_batch};
use basalt_ordering_types::Batch;
use tokio::sync::mpsc;

fn batch(tag: u8) -> Batch {
    singleton_batch(signed_tx("relay@basalt", 1, &[tag], 9_000 + tag as u64))
}

#[tokio::test]
async fn forwards_when_gate_has_capacity() {
    let (completed_tx, completed_rx) = mpsc::unbounded_channel();
    let (gate_tx, mut gate_rx) = mpsc::channel(4);
    let relay = tokio::spawn(run_relay(completed_rx, gate_tx, 8));

    completed_tx.send(batch(1)).unwrap();
    completed_tx.send(batch(2)).unwrap();
    drop(completed_tx);

    assert_eq!(gate_rx.recv().await.unwrap(), batch(1));
    assert_eq!(gate_rx.recv().await.unwrap(), batch(2));
    relay.await.unwrap();
}

#[tokio::test]
async fn parks_on_backpressure_and_drains_in_order() {
    let (completed_tx, completed_rx) = mpsc::unbounded_channel();
    let (gate_tx, mut gate_rx) = mpsc::channel(1);
    let relay = tokio::spawn(run_relay(completed_rx, gate_tx, 8));

    for tag in 1..=4 {
        completed_tx.send(batch(tag)).unwrap();
    }
    drop(completed_tx);

    // first batch sits in the channel, the rest wait in the relay and
    // drain as we consume
    for tag in 1..=4 {
        assert_eq!(gate_rx.recv().await.unwrap(), batch(tag));
    }
    relay.await.unwrap();
}

#[tokio::test]
async fn overflow_drops_the_oldest_parked_batch() {
    let (completed_tx, completed_rx) = mpsc::unbounded_channel();
    let (gate_tx, mut gate_rx) = mpsc::channel(1);
    let relay = tokio::spawn(run_relay(completed_rx, gate_tx, 2));

    // one fills the channel, the next three overflow a two-slot buffer
    for tag in 1..=5 {
        completed_tx.send(batch(tag)).unwrap();
        tokio::task::yield_now().await;
    }
    drop(completed_tx);

    let mut delivered = Vec::new();
    while let Some(b) = gate_rx.recv().await {
        delivered.push(b);
    }
    relay.await.unwrap();

    // batch 1 went straight through; of 2..5 only the newest two survive
    assert_eq!(delivered, vec![batch(1), batch(4), batch(5)]);
}
