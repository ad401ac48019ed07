// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    counters,
    presence_cache::PresenceReader,
    torii::status_bus::StatusBus,
    util::time_service::TimeService,
};
use basalt_ordering_types::{
    Batch, HashValue, PresenceStatus, StatusResponse, Transaction, TxStatus,
};
use lru::LruCache;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "command_service_test.rs"]
mod command_service_test;

/// Capacity of one status-stream channel toward a client.
const STREAM_CAPACITY: usize = 16;

/// The service behind the Torii endpoints: accepts transactions and
/// batches, answers status queries, and serves status streams.
pub struct CommandService {
    presence: Arc<dyn PresenceReader>,
    bus: StatusBus,
    time: Arc<dyn TimeService>,
    /// Timeout between non-final statuses on a stream.
    stale_stream_timeout: Duration,
    /// Recently observed statuses, kept current by the cache updater.
    status_cache: Arc<Mutex<LruCache<HashValue, StatusResponse>>>,
    /// Incomplete batches head for signature aggregation.
    mst_batches: mpsc::UnboundedSender<Batch>,
    /// Complete batches go straight into the gate's ingest queue.
    gate_batches: mpsc::Sender<Batch>,
}

impl CommandService {
    pub fn new(
        presence: Arc<dyn PresenceReader>,
        bus: StatusBus,
        time: Arc<dyn TimeService>,
        stale_stream_timeout: Duration,
        status_cache_capacity: usize,
        mst_batches: mpsc::UnboundedSender<Batch>,
        gate_batches: mpsc::Sender<Batch>,
    ) -> Self {
        Self {
            presence,
            bus,
            time,
            stale_stream_timeout,
            status_cache: Arc::new(Mutex::new(LruCache::new(status_cache_capacity))),
            mst_batches,
            gate_batches,
        }
    }

    /// Keep the status cache tracking the bus. One updater per service;
    /// the priority rule makes stale publications harmless.
    pub fn spawn_cache_updater(&self) -> JoinHandle<()> {
        let mut statuses = self.bus.subscribe();
        let cache = Arc::clone(&self.status_cache);
        tokio::spawn(async move {
            loop {
                match statuses.recv().await {
                    Ok(status) => {
                        let mut cache = cache.lock();
                        let replace = cache
                            .get(&status.tx_hash)
                            .map_or(true, |known| status.priority() >= known.priority());
                        if replace {
                            cache.put(status.tx_hash, status);
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "status cache updater lagged behind the bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Accept a single transaction (`Torii`).
    pub async fn handle_transaction(&self, transaction: Transaction) {
        let hash = transaction.hash();
        match Batch::single(transaction) {
            Ok(batch) => self.handle_transaction_batch(batch).await,
            Err(error) => {
                debug!(tx = %hash, error = %error, "transaction failed structural validation");
                self.bus.publish(
                    StatusResponse::new(hash, TxStatus::StatelessFailed)
                        .with_error(error.to_string()),
                );
            }
        }
    }

    /// Accept a batch (`ListTorii`). Batches the ledger already settled
    /// are dropped without a word: the caller can query status and will
    /// see the terminal state. Everything else passes stateless
    /// validation and is routed: complete batches to the ordering gate,
    /// incomplete ones to MST aggregation.
    pub async fn handle_transaction_batch(&self, batch: Batch) {
        match self.presence.check_batch(&batch) {
            Ok(statuses) if statuses.iter().any(PresenceStatus::is_already_processed) => {
                counters::ALREADY_PROCESSED_BATCHES.inc();
                debug!(batch = ?batch, "dropping batch already settled by the ledger");
                return;
            }
            Ok(_) => {}
            Err(error) => {
                // submission stays live on store trouble; the gate-side
                // check is the safety net
                warn!(error = %error, "presence check failed during submission");
            }
        }

        if let Some(reason) = self.stateless_defect(&batch) {
            for tx in batch.transactions() {
                self.bus.publish(
                    StatusResponse::new(tx.hash(), TxStatus::StatelessFailed)
                        .with_error(reason.clone()),
                );
            }
            return;
        }

        for tx in batch.transactions() {
            self.bus.publish(StatusResponse::new(tx.hash(), TxStatus::StatelessValid));
        }

        if batch.is_complete() {
            if self.gate_batches.send(batch).await.is_err() {
                warn!("ordering gate ingest closed, dropping complete batch");
            }
        } else if self.mst_batches.send(batch).is_err() {
            warn!("mst processor closed, dropping incomplete batch");
        }
    }

    /// One-shot status: live cache first, ledger second, `NotReceived`
    /// when neither knows the hash or the store is down.
    pub fn get_status(&self, hash: HashValue) -> StatusResponse {
        if let Some(status) = self.status_cache.lock().get(&hash) {
            return status.clone();
        }
        match self.presence.check(&hash) {
            Ok(PresenceStatus::Committed(_)) => StatusResponse::new(hash, TxStatus::Committed),
            Ok(PresenceStatus::Rejected(_)) => StatusResponse::new(hash, TxStatus::Rejected),
            Ok(PresenceStatus::Missing(_)) => StatusResponse::new(hash, TxStatus::NotReceived),
            Err(error) => {
                warn!(tx = %hash, error = %error, "presence lookup failed for status query");
                StatusResponse::new(hash, TxStatus::NotReceived)
            }
        }
    }

    /// Status stream: the currently known status as a seed, then live
    /// bus updates. Ends on a final status, after `initial_timeout`
    /// without any status, or after the configured stale timeout
    /// between non-final statuses.
    pub fn get_status_stream(
        &self,
        hash: HashValue,
        initial_timeout: Duration,
    ) -> ReceiverStream<StatusResponse> {
        let (sink, stream) = mpsc::channel(STREAM_CAPACITY);
        let mut live = self.bus.subscribe();
        let seed = self.known_status(hash);
        let stale_timeout = self.stale_stream_timeout;

        tokio::spawn(async move {
            let mut last_priority = None;
            let mut seeded = false;
            if let Some(status) = seed {
                last_priority = Some(status.priority());
                let ends = status.is_final();
                if sink.send(status).await.is_err() || ends {
                    return;
                }
                seeded = true;
            }

            // a delivered seed counts as a status: from then on only the
            // between-status window applies
            let mut window = if seeded { stale_timeout } else { initial_timeout };
            loop {
                let status = match timeout(window, live.recv()).await {
                    Err(_) => {
                        debug!(tx = %hash, "status stream went stale");
                        return;
                    }
                    Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(missed))) => {
                        warn!(tx = %hash, missed, "status stream lagged behind the bus");
                        continue;
                    }
                    Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => return,
                    Ok(Ok(status)) => status,
                };
                if status.tx_hash != hash {
                    continue;
                }
                if last_priority.map_or(false, |known| status.priority() < known) {
                    continue;
                }
                last_priority = Some(status.priority());
                let ends = status.is_final();
                if sink.send(status).await.is_err() || ends {
                    return;
                }
                window = stale_timeout;
            }
        });

        ReceiverStream::new(stream)
    }

    fn known_status(&self, hash: HashValue) -> Option<StatusResponse> {
        if let Some(status) = self.status_cache.lock().get(&hash) {
            return Some(status.clone());
        }
        match self.presence.check(&hash) {
            Ok(PresenceStatus::Committed(_)) => {
                Some(StatusResponse::new(hash, TxStatus::Committed))
            }
            Ok(PresenceStatus::Rejected(_)) => Some(StatusResponse::new(hash, TxStatus::Rejected)),
            _ => None,
        }
    }

    /// Stateless checks beyond batch construction: well-formed creator
    /// ids and sane client clocks.
    fn stateless_defect(&self, batch: &Batch) -> Option<String> {
        let now_ms = self.time.now_ms();
        for tx in batch.transactions() {
            if !tx.creator().is_well_formed() {
                return Some(format!("malformed creator account id: {}", tx.creator()));
            }
            if !tx.is_within_clock_drift(now_ms) {
                return Some(format!(
                    "transaction timestamp {} outside the acceptable window around {}",
                    tx.created_time_ms(),
                    now_ms
                ));
            }
        }
        None
    }
}
