// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotone height-like counter incremented on every committed block.
pub type BlockRound = u64;

/// Inner counter incremented on every consensus round that did not commit
/// a block.
pub type RejectRound = u32;

/// First reject round after a successful block commit.
pub const FIRST_REJECT_ROUND: RejectRound = 1;

/// Identifier of a single agreement round.
///
/// Rounds are totally ordered lexicographically: all reject rounds of one
/// block round precede every round of the next block round. Every round a
/// node observes is strictly greater than any previously committed round.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Round {
    pub block_round: BlockRound,
    pub reject_round: RejectRound,
}

impl Round {
    pub const fn new(block_round: BlockRound, reject_round: RejectRound) -> Self {
        Self { block_round, reject_round }
    }

    /// Round entered after a block commit: block counter advances, reject
    /// counter resets.
    pub fn next_commit(self) -> Self {
        Self::new(self.block_round + 1, FIRST_REJECT_ROUND)
    }

    /// Round entered after a reject outcome: only the reject counter moves.
    pub fn next_reject(self) -> Self {
        Self::new(self.block_round, self.reject_round + 1)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.block_round, self.reject_round)
    }
}
