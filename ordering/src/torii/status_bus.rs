// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::counters;
use basalt_ordering_types::{HashValue, StatusResponse};
use lru::LruCache;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info};

#[cfg(test)]
#[path = "status_bus_test.rs"]
mod status_bus_test;

/// Single-producer-side, many-consumer multicast of transaction
/// statuses.
///
/// `publish` never blocks: statuses enter an unbounded queue drained by
/// one worker task, which serializes them and fans out on a broadcast
/// channel, so every subscriber observes the same order. The worker also
/// enforces the lifecycle: per transaction, a status of lower priority
/// than one already fanned out is dropped, and nothing follows a final
/// status.
#[derive(Clone)]
pub struct StatusBus {
    publisher: mpsc::UnboundedSender<StatusResponse>,
    fanout: broadcast::Sender<StatusResponse>,
}

impl StatusBus {
    pub fn start(fanout_capacity: usize, guard_capacity: usize) -> (Self, JoinHandle<()>) {
        let (publisher, mut queue) = mpsc::unbounded_channel::<StatusResponse>();
        let (fanout, _) = broadcast::channel(fanout_capacity);

        let worker_fanout = fanout.clone();
        let worker = tokio::spawn(async move {
            let mut last_seen: LruCache<HashValue, (u8, bool)> = LruCache::new(guard_capacity);
            while let Some(status) = queue.recv().await {
                let admissible = match last_seen.get(&status.tx_hash) {
                    Some((priority, finalized)) => {
                        !*finalized && status.priority() >= *priority
                    }
                    None => true,
                };
                if !admissible {
                    debug!(tx = %status.tx_hash, status = %status.status, "suppressing out-of-order status");
                    continue;
                }
                last_seen.put(status.tx_hash, (status.priority(), status.is_final()));
                counters::STATUSES_PUBLISHED.inc();
                // send only fails when nobody subscribes, which is fine
                let _ = worker_fanout.send(status);
            }
            info!("status bus stopped");
        });

        (Self { publisher, fanout }, worker)
    }

    /// Non-blocking publish; ordering is fixed by arrival at the worker.
    pub fn publish(&self, status: StatusResponse) {
        let _ = self.publisher.send(status);
    }

    /// Live statuses from this point on; earlier publications are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusResponse> {
        self.fanout.subscribe()
    }
}
