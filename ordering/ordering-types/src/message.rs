// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! Bodies of the three peer-to-peer RPCs. The wire codec and RPC framing
//! are an external collaborator; these types only fix what travels. All
//! bodies round-trip through the canonical binary encoding.

use crate::{
    batch::{reassemble_batches, Batch},
    crypto::PublicKey,
    proposal::Proposal,
    round::Round,
    transaction::Transaction,
};
use serde::{Deserialize, Serialize};

/// Body of `SendMstState`: the sender's pending batches with every
/// signature accumulated so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MstStateMessage {
    pub source: PublicKey,
    pub batches: Vec<Batch>,
}

/// Body of `SendBatches`: a target round plus a flat transaction
/// sequence. Batches travel flattened; the receiver regroups them through
/// the batch parser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchesMessage {
    pub round: Round,
    pub transactions: Vec<Transaction>,
}

impl BatchesMessage {
    pub fn from_batches(round: Round, batches: impl IntoIterator<Item = Batch>) -> Self {
        let transactions = batches
            .into_iter()
            .flat_map(|batch| batch.transactions().to_vec())
            .collect();
        Self { round, transactions }
    }

    /// Regroup and re-validate the flattened transactions. Returns the
    /// batches plus the number of transactions dropped by validation.
    pub fn into_batches(self) -> (Vec<Batch>, usize) {
        reassemble_batches(self.transactions)
    }
}

/// Body of `RequestProposal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub round: Round,
}

/// Reply to `RequestProposal`; empty when the peer has no proposal packed
/// for that round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub proposal: Option<Proposal>,
}
