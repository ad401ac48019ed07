// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! Transport seams of the pipeline. The RPC substrate (framing, codec,
//! connection management) lives outside this crate; these traits are what
//! the pipeline calls outward, and [`OrderingServer`] is what the host
//! wires inbound requests into.

use crate::{
    error::{ServerError, TransportError},
    ordering_service::OrderingService,
};
use async_trait::async_trait;
use basalt_ordering_types::{
    message::{BatchesMessage, MstStateMessage, ProposalRequest, ProposalResponse},
    Batch, Peer, Proposal, Round,
};
use std::sync::Arc;
use tracing::warn;

#[cfg(test)]
#[path = "network_test.rs"]
mod network_test;

/// Client connection to one peer's on-demand ordering service.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Deliver batches destined for `round` on that peer.
    async fn send_batches(&self, round: Round, batches: Vec<Batch>) -> Result<(), TransportError>;

    /// Ask the peer for its proposal packed for `round`.
    async fn request_proposal(&self, round: Round) -> Result<Option<Proposal>, TransportError>;
}

/// Creates client connections for peers as role assignments change.
pub trait PeerClientFactory: Send + Sync {
    fn create(&self, peer: &Peer) -> Arc<dyn PeerClient>;
}

/// Outbound MST gossip: unary, fire-and-forget state transfer.
#[async_trait]
pub trait MstStateSender: Send + Sync {
    async fn send_state(&self, peer: &Peer, message: MstStateMessage)
        -> Result<(), TransportError>;
}

/// Server side of the ordering-service RPCs: decodes the wire bodies back
/// into domain objects and forwards them into the local service.
pub struct OrderingServer {
    ordering_service: Arc<OrderingService>,
}

impl OrderingServer {
    pub fn new(ordering_service: Arc<OrderingService>) -> Self {
        Self { ordering_service }
    }

    /// Handle an inbound `SendBatches`. Transactions whose group fails
    /// structural validation are dropped and reported; the remainder is
    /// admitted.
    pub fn handle_batches(&self, message: BatchesMessage) -> Result<(), ServerError> {
        let round = message.round;
        let (batches, dropped) = message.into_batches();
        if !batches.is_empty() {
            self.ordering_service.on_batches(round, batches);
        }
        if dropped > 0 {
            warn!(round = %round, dropped, "rejected malformed transactions from peer batch message");
            return Err(ServerError::StatelessValidation(dropped));
        }
        Ok(())
    }

    /// Handle an inbound `RequestProposal`. Unknown rounds yield an empty
    /// response, never an error.
    pub fn handle_proposal_request(&self, request: ProposalRequest) -> ProposalResponse {
        ProposalResponse { proposal: self.ordering_service.on_request_proposal(request.round) }
    }
}
