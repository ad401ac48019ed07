// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! Builders and fakes shared by the crate's tests.

use crate::{
    error::{StorageError, TransportError},
    network::{MstStateSender, PeerClient, PeerClientFactory},
    ordering_service::OrderingService,
    presence_cache::{PresenceBackend, PresenceReader},
};
use async_trait::async_trait;
use basalt_ordering_types::{
    message::MstStateMessage, Batch, BatchMeta, BatchType, Command, HashValue, Peer,
    PresenceStatus, Proposal, PublicKey, Round, Signature, Transaction, TransactionPayload,
};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Transaction signed by one stub signatory per tag in `signer_tags`.
/// Identity is determined by creator, creation time and quorum, so two
/// calls differing only in signers build copies of the same transaction.
pub fn signed_tx(creator: &str, quorum: u32, signer_tags: &[u8], created_time_ms: u64) -> Transaction {
    let payload = TransactionPayload {
        creator: creator.into(),
        created_time_ms,
        quorum,
        commands: vec![Command::new("store", b"k=v".to_vec())],
    };
    let mut tx = Transaction::new(payload, vec![]);
    let reduced = tx.reduced_hash();
    for tag in signer_tags {
        tx.add_signature(Signature::stub(PublicKey::from_u8(*tag), &reduced));
    }
    tx
}

pub fn singleton_batch(tx: Transaction) -> Batch {
    Batch::single(tx).expect("valid test transaction")
}

/// Multi-transaction atomic batch with consistent batch meta.
pub fn atomic_batch(mut transactions: Vec<Transaction>) -> Batch {
    let reduced: Vec<HashValue> = transactions.iter().map(Transaction::reduced_hash).collect();
    for tx in &mut transactions {
        tx.set_batch_meta(Some(BatchMeta::new(BatchType::Atomic, reduced.clone())));
    }
    Batch::new(transactions).expect("valid test batch")
}

pub fn test_peer(tag: u8) -> Peer {
    Peer::new(PublicKey::from_u8(tag), format!("peer{tag}.basalt:50051"))
}

/// In-memory stand-in for the ledger's block index. Doubles as a direct
/// [`PresenceReader`] so tests can skip the memoizing cache layer.
#[derive(Default)]
pub struct MemoryPresenceBackend {
    statuses: Mutex<HashMap<HashValue, PresenceStatus>>,
    failing: AtomicBool,
}

impl MemoryPresenceBackend {
    pub fn mark_committed(&self, hash: HashValue) {
        self.statuses.lock().insert(hash, PresenceStatus::Committed(hash));
    }

    pub fn mark_rejected(&self, hash: HashValue) {
        self.statuses.lock().insert(hash, PresenceStatus::Rejected(hash));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl PresenceBackend for MemoryPresenceBackend {
    fn transaction_status(&self, hash: &HashValue) -> Result<PresenceStatus, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected failure".into()));
        }
        Ok(self
            .statuses
            .lock()
            .get(hash)
            .copied()
            .unwrap_or(PresenceStatus::Missing(*hash)))
    }
}

impl PresenceReader for MemoryPresenceBackend {
    fn check(&self, hash: &HashValue) -> Result<PresenceStatus, StorageError> {
        self.transaction_status(hash)
    }
}

/// Records outbound MST gossip instead of sending it anywhere.
#[derive(Default)]
pub struct RecordingMstSender {
    sent: Mutex<Vec<(Peer, MstStateMessage)>>,
}

impl RecordingMstSender {
    pub fn sent(&self) -> Vec<(Peer, MstStateMessage)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MstStateSender for RecordingMstSender {
    async fn send_state(
        &self,
        peer: &Peer,
        message: MstStateMessage,
    ) -> Result<(), TransportError> {
        self.sent.lock().push((peer.clone(), message));
        Ok(())
    }
}

/// What a [`RecordingPeerClient`] does when called.
#[derive(Clone, Copy, Debug)]
pub enum ClientBehavior {
    /// Answer normally, serving the configured proposal.
    Respond,
    /// Fail with a transport error.
    Fail,
    /// Never answer; lets callers exercise their deadlines.
    Hang,
}

/// Per-peer client fake: records traffic and answers according to its
/// configured behavior.
pub struct RecordingPeerClient {
    batches: Mutex<Vec<(Round, Vec<Batch>)>>,
    requests: Mutex<Vec<Round>>,
    proposal: Mutex<Option<Proposal>>,
    behavior: Mutex<ClientBehavior>,
}

impl Default for RecordingPeerClient {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            proposal: Mutex::new(None),
            behavior: Mutex::new(ClientBehavior::Respond),
        }
    }
}

impl RecordingPeerClient {
    pub fn sent_batches(&self) -> Vec<(Round, Vec<Batch>)> {
        self.batches.lock().clone()
    }

    pub fn proposal_requests(&self) -> Vec<Round> {
        self.requests.lock().clone()
    }

    pub fn set_proposal(&self, proposal: Option<Proposal>) {
        *self.proposal.lock() = proposal;
    }

    pub fn set_behavior(&self, behavior: ClientBehavior) {
        *self.behavior.lock() = behavior;
    }

    fn behavior(&self) -> ClientBehavior {
        *self.behavior.lock()
    }
}

#[async_trait]
impl PeerClient for RecordingPeerClient {
    async fn send_batches(&self, round: Round, batches: Vec<Batch>) -> Result<(), TransportError> {
        self.batches.lock().push((round, batches));
        match self.behavior() {
            ClientBehavior::Respond => Ok(()),
            ClientBehavior::Fail => Err(TransportError::Unreachable("recording peer".into())),
            ClientBehavior::Hang => std::future::pending().await,
        }
    }

    async fn request_proposal(&self, round: Round) -> Result<Option<Proposal>, TransportError> {
        self.requests.lock().push(round);
        match self.behavior() {
            ClientBehavior::Respond => Ok(self.proposal.lock().clone()),
            ClientBehavior::Fail => Err(TransportError::Unreachable("recording peer".into())),
            ClientBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Hands out one [`RecordingPeerClient`] per peer key, shared across
/// role reassignments so recordings accumulate.
#[derive(Default)]
pub struct RecordingClientFactory {
    clients: Mutex<HashMap<PublicKey, Arc<RecordingPeerClient>>>,
    created: Mutex<Vec<PublicKey>>,
}

impl RecordingClientFactory {
    pub fn client(&self, key: &PublicKey) -> Arc<RecordingPeerClient> {
        Arc::clone(self.clients.lock().entry(*key).or_default())
    }

    pub fn created_peers(&self) -> Vec<PublicKey> {
        self.created.lock().clone()
    }
}

impl PeerClientFactory for RecordingClientFactory {
    fn create(&self, peer: &Peer) -> Arc<dyn PeerClient> {
        self.created.lock().push(peer.public_key);
        self.client(&peer.public_key)
    }
}

/// Client factory that short-circuits every peer to the local ordering
/// service, for single-node pipeline tests. The service is connected
/// after the pipeline is built, closing the construction cycle.
#[derive(Clone, Default)]
pub struct LoopbackFactory {
    service: Arc<OnceCell<Arc<OrderingService>>>,
}

impl LoopbackFactory {
    pub fn connect(&self, service: Arc<OrderingService>) {
        self.service.set(service).map_err(|_| ()).expect("loopback already connected");
    }
}

impl PeerClientFactory for LoopbackFactory {
    fn create(&self, _peer: &Peer) -> Arc<dyn PeerClient> {
        Arc::new(LoopbackClient { service: Arc::clone(&self.service) })
    }
}

struct LoopbackClient {
    service: Arc<OnceCell<Arc<OrderingService>>>,
}

#[async_trait]
impl PeerClient for LoopbackClient {
    async fn send_batches(&self, round: Round, batches: Vec<Batch>) -> Result<(), TransportError> {
        if let Some(service) = self.service.get() {
            service.on_batches(round, batches);
        }
        Ok(())
    }

    async fn request_proposal(&self, round: Round) -> Result<Option<Proposal>, TransportError> {
        Ok(self.service.get().and_then(|service| service.on_request_proposal(round)))
    }
}
