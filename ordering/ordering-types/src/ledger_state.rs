// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{crypto::PublicKey, hash::HashValue};
use serde::{Deserialize, Serialize};

/// A validator known to the ledger: its signing identity and the address
/// its ordering service listens on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub public_key: PublicKey,
    pub address: String,
}

impl Peer {
    pub fn new(public_key: PublicKey, address: impl Into<String>) -> Self {
        Self { public_key, address: address.into() }
    }
}

/// Snapshot of the ledger as of the latest commit, carried along with
/// round-switch events so consumers never race the world state view for
/// the peer list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub top_block_height: u64,
    pub top_block_hash: HashValue,
    pub peers: Vec<Peer>,
}

impl LedgerState {
    pub fn new(top_block_height: u64, top_block_hash: HashValue, peers: Vec<Peer>) -> Self {
        Self { top_block_height, top_block_hash, peers }
    }
}
