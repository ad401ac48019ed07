// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::counters;
use basalt_ordering_types::Batch;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[cfg(test)]
#[path = "relay_test.rs"]
mod relay_test;

/// Buffer between MST completion and the ordering gate.
///
/// Completed batches are pushed into the gate's bounded ingest channel;
/// when the gate has no capacity they wait here, up to `capacity` of
/// them, and drain as channel permits free up. On overflow the oldest
/// waiting batch is dropped. It is not gone from the network, other
/// peers hold it and clients can resubmit, but locally this is a loss
/// worth shouting about.
pub async fn run_relay(
    mut completed: mpsc::UnboundedReceiver<Batch>,
    gate: mpsc::Sender<Batch>,
    capacity: usize,
) {
    let mut pending: VecDeque<Batch> = VecDeque::new();
    let mut inbound_open = true;

    loop {
        if pending.is_empty() {
            if !inbound_open {
                break;
            }
            match completed.recv().await {
                Some(batch) => {
                    if !forward_or_park(&gate, &mut pending, batch) {
                        return;
                    }
                }
                None => break,
            }
        } else if inbound_open {
            tokio::select! {
                permit = gate.reserve() => match permit {
                    Ok(permit) => {
                        if let Some(batch) = pending.pop_front() {
                            permit.send(batch);
                        }
                    }
                    Err(_) => return,
                },
                maybe_batch = completed.recv() => match maybe_batch {
                    Some(batch) => park(&mut pending, batch, capacity),
                    None => inbound_open = false,
                },
            }
        } else {
            match gate.reserve().await {
                Ok(permit) => {
                    if let Some(batch) = pending.pop_front() {
                        permit.send(batch);
                    }
                }
                Err(_) => return,
            }
        }
    }
    info!("mst gate relay stopped");
}

/// Try the fast path into the gate; park the batch on backpressure.
/// Returns false when the gate is gone.
fn forward_or_park(
    gate: &mpsc::Sender<Batch>,
    pending: &mut VecDeque<Batch>,
    batch: Batch,
) -> bool {
    match gate.try_send(batch) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(batch)) => {
            debug!(batch = ?batch, "gate busy, parking completed batch");
            pending.push_back(batch);
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

fn park(pending: &mut VecDeque<Batch>, batch: Batch, capacity: usize) {
    pending.push_back(batch);
    if pending.len() > capacity {
        if let Some(dropped) = pending.pop_front() {
            counters::RELAY_DROPPED_BATCHES.inc();
            error!(batch = ?dropped, "gate relay overflow, dropping oldest completed batch");
        }
    }
}
