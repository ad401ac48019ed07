// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::hash::HashValue;
use serde::{Deserialize, Serialize};

/// Ledger-level outcome of a transaction, as reported by the presence
/// cache over the block index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    /// The transaction is part of a committed block.
    Committed(HashValue),
    /// The transaction was rejected by the network and its hash recorded
    /// in a block's rejected list.
    Rejected(HashValue),
    /// The transaction does not appear in the ledger.
    Missing(HashValue),
}

impl PresenceStatus {
    pub fn hash(&self) -> HashValue {
        match self {
            Self::Committed(hash) | Self::Rejected(hash) | Self::Missing(hash) => *hash,
        }
    }

    /// A transaction counts as already processed exactly when the ledger
    /// recorded a terminal fate for it.
    pub fn is_already_processed(&self) -> bool {
        !matches!(self, Self::Missing(_))
    }
}
