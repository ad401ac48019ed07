// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use basalt_ordering_types::{HashValue, LedgerState, Proposal, Round};
use std::collections::HashSet;

/// How the just-finished consensus round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A block was committed; the block round advances.
    Commit,
    /// No block was agreed; only the reject round advances.
    Reject,
}

/// Signal from the synchronizer that a round has closed and the next one
/// should begin. On commits it also carries the fate of the transactions
/// in the committed block, so downstream caches can evict them.
#[derive(Clone, Debug)]
pub struct RoundSwitch {
    pub next_round: Round,
    pub outcome: RoundOutcome,
    pub ledger_state: LedgerState,
    pub committed_hashes: Vec<HashValue>,
    pub rejected_hashes: Vec<HashValue>,
}

impl RoundSwitch {
    pub fn reject(next_round: Round, ledger_state: LedgerState) -> Self {
        Self {
            next_round,
            outcome: RoundOutcome::Reject,
            ledger_state,
            committed_hashes: Vec::new(),
            rejected_hashes: Vec::new(),
        }
    }

    pub fn commit(
        next_round: Round,
        ledger_state: LedgerState,
        committed_hashes: Vec<HashValue>,
        rejected_hashes: Vec<HashValue>,
    ) -> Self {
        Self {
            next_round,
            outcome: RoundOutcome::Commit,
            ledger_state,
            committed_hashes,
            rejected_hashes,
        }
    }

    /// Every hash the committed block settled, committed and rejected
    /// alike.
    pub fn processed_hashes(&self) -> HashSet<HashValue> {
        self.committed_hashes
            .iter()
            .chain(self.rejected_hashes.iter())
            .copied()
            .collect()
    }
}

/// Transaction fates settled by a committed block, for status
/// publication.
#[derive(Clone, Debug, Default)]
pub struct CommitNotification {
    pub committed: Vec<HashValue>,
    pub rejected: Vec<HashValue>,
}

impl From<&RoundSwitch> for CommitNotification {
    fn from(event: &RoundSwitch) -> Self {
        Self {
            committed: event.committed_hashes.clone(),
            rejected: event.rejected_hashes.clone(),
        }
    }
}

/// Emitted by the ordering gate once per round switch: the proposal to
/// vote on (when one survived retrieval and replay stripping) together
/// with the round it belongs to.
#[derive(Clone, Debug)]
pub struct OrderingEvent {
    pub proposal: Option<Proposal>,
    pub round: Round,
    pub ledger_state: LedgerState,
}

/// Stateful-validation verdict for one transaction that did not pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionError {
    pub tx_hash: HashValue,
    pub command_name: String,
    pub command_index: u32,
    pub error_code: u32,
    pub message: String,
}

/// Outcome of stateful validation over a proposal: the surviving
/// transactions plus per-transaction errors for the rest. Produced by the
/// external verified-proposal creator, consumed by the status processor.
#[derive(Clone, Debug)]
pub struct VerifiedProposalOutcome {
    pub proposal: Proposal,
    pub errors: Vec<TransactionError>,
}
