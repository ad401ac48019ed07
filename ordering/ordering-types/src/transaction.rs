// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    batch::BatchMeta,
    crypto::{PublicKey, Signature},
    hash::HashValue,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Oldest acceptable transaction timestamp relative to local time.
pub const MAX_TX_AGE_MS: u64 = 24 * 60 * 60 * 1000;

/// How far into the future a transaction timestamp may drift.
pub const MAX_TX_FUTURE_DRIFT_MS: u64 = 5 * 60 * 1000;

/// Identifier of the account that authored a transaction, in
/// `name@domain` form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(literal: impl Into<String>) -> Self {
        Self(literal.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Structural check used by stateless validation: `name@domain` with
    /// both parts non-empty.
    pub fn is_well_formed(&self) -> bool {
        match self.0.split_once('@') {
            Some((name, domain)) => !name.is_empty() && !domain.is_empty(),
            None => false,
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(literal: &str) -> Self {
        Self::new(literal)
    }
}

/// A single instruction inside a transaction. The stateful command
/// executor interprets these; the pipeline treats them as opaque and only
/// surfaces their names in failure statuses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl Command {
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { name: name.into(), payload }
    }
}

/// The reduced payload of a transaction: exactly the part covered by the
/// reduced hash, which is the transaction identity used for deduplication
/// and batch membership. Batch meta and signatures live outside so that
/// meta lists can be built from reduced hashes without circularity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub creator: AccountId,
    /// Milliseconds since the Unix epoch, assigned by the client.
    pub created_time_ms: u64,
    /// Number of distinct signatories required before the transaction may
    /// be ordered.
    pub quorum: u32,
    pub commands: Vec<Command>,
}

/// A client-submitted transaction: a reduced payload, the batch meta when
/// the transaction travels as part of a multi-transaction batch, and the
/// signatures collected so far. Signatures are keyed by signatory, so
/// re-adding a known signatory is a no-op.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    payload: TransactionPayload,
    batch_meta: Option<BatchMeta>,
    signatures: BTreeMap<PublicKey, Signature>,
}

impl Transaction {
    pub fn new(payload: TransactionPayload, signatures: Vec<Signature>) -> Self {
        let signatures = signatures.into_iter().map(|s| (s.public_key, s)).collect();
        Self { payload, batch_meta: None, signatures }
    }

    pub fn payload(&self) -> &TransactionPayload {
        &self.payload
    }

    pub fn creator(&self) -> &AccountId {
        &self.payload.creator
    }

    pub fn created_time_ms(&self) -> u64 {
        self.payload.created_time_ms
    }

    pub fn quorum(&self) -> u32 {
        self.payload.quorum
    }

    pub fn commands(&self) -> &[Command] {
        &self.payload.commands
    }

    pub fn batch_meta(&self) -> Option<&BatchMeta> {
        self.batch_meta.as_ref()
    }

    pub fn set_batch_meta(&mut self, meta: Option<BatchMeta>) {
        self.batch_meta = meta;
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.values()
    }

    pub fn signatures_count(&self) -> usize {
        self.signatures.len()
    }

    /// Content hash over payload and batch meta. This is the hash
    /// clients use to query transaction status and the one recorded in
    /// blocks; it is stable while signatures accumulate.
    pub fn hash(&self) -> HashValue {
        HashValue::digest_of(&(&self.payload, &self.batch_meta))
    }

    /// Hash of the signed payload only. Two copies of one transaction
    /// carrying different signature subsets share a reduced hash.
    pub fn reduced_hash(&self) -> HashValue {
        HashValue::digest_of(&self.payload)
    }

    /// Add a signature; returns whether the signature set grew.
    pub fn add_signature(&mut self, signature: Signature) -> bool {
        match self.signatures.entry(signature.public_key) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(signature);
                true
            }
        }
    }

    /// Union the other copy's signatures into this one; returns whether
    /// the set strictly grew. Both copies must share a reduced hash.
    pub fn merge_signatures(&mut self, other: &Transaction) -> bool {
        let mut grew = false;
        for signature in other.signatures.values() {
            grew |= self.add_signature(signature.clone());
        }
        grew
    }

    pub fn has_quorum(&self) -> bool {
        self.signatures.len() >= self.payload.quorum as usize
    }

    /// Stateless timestamp check relative to the local clock.
    pub fn is_within_clock_drift(&self, now_ms: u64) -> bool {
        let created = self.payload.created_time_ms;
        created <= now_ms.saturating_add(MAX_TX_FUTURE_DRIFT_MS)
            && created >= now_ms.saturating_sub(MAX_TX_AGE_MS)
    }
}
