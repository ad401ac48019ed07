// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{hash::HashValue, transaction::Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A candidate ordered transaction list for one round, not yet voted on.
///
/// Immutable once built. The height equals the block round the proposal
/// was produced for; no two proposals with the same height are observable
/// from a correct node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    height: u64,
    created_time_ms: u64,
    transactions: Vec<Transaction>,
}

impl Proposal {
    pub fn new(height: u64, created_time_ms: u64, transactions: Vec<Transaction>) -> Self {
        Self { height, created_time_ms, transactions }
    }

    /// Liveness placeholder emitted when no real proposal could be
    /// obtained for a round.
    pub fn empty(height: u64, created_time_ms: u64) -> Self {
        Self::new(height, created_time_ms, Vec::new())
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn created_time_ms(&self) -> u64 {
        self.created_time_ms
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn hash(&self) -> HashValue {
        HashValue::digest_of(self)
    }
}

impl fmt::Debug for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proposal(height {}, {} txs)", self.height, self.transactions.len())
    }
}
