// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{hash::HashValue, transaction::Transaction};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How the transactions of a batch relate to each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchType {
    /// All transactions commit together or none do.
    Atomic,
    /// Transactions are applied in batch order, failures do not undo
    /// earlier members.
    Ordered,
}

/// Metadata shared by every transaction of a multi-transaction batch: the
/// batch type and the ordered reduced hashes of all members. The reduced
/// hash list is the batch identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchMeta {
    pub batch_type: BatchType,
    pub reduced_hashes: Vec<HashValue>,
}

impl BatchMeta {
    pub fn new(batch_type: BatchType, reduced_hashes: Vec<HashValue>) -> Self {
        Self { batch_type, reduced_hashes }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch contains no transactions")]
    Empty,
    #[error("transaction {0} declares a zero quorum")]
    ZeroQuorum(HashValue),
    #[error("batch carries no signatures at all")]
    NoSignatures,
    #[error("multi-transaction batch member {0} has no batch meta")]
    MissingMeta(HashValue),
    #[error("batch meta does not match the contained transactions")]
    MetaMismatch,
}

/// Ordered set of transactions submitted, validated and proposed as a
/// unit.
///
/// Identity, for deduplication, merging and cache eviction, is the
/// ordered list of member reduced hashes; signature sets are deliberately
/// excluded, so two copies of a batch at different signing progress
/// compare equal.
#[derive(Clone, Serialize, Deserialize)]
pub struct Batch {
    transactions: Vec<Transaction>,
}

/// Batch identity: ordered reduced hashes of the members.
pub type BatchIdentity = Vec<HashValue>;

impl Batch {
    /// Validate and construct. Enforces the structural invariants:
    /// non-empty, quorum ≥ 1 everywhere, at least one signature overall,
    /// and, for multi-transaction batches, a meta on every member whose
    /// hash list is exactly the members' reduced hashes in order.
    pub fn new(transactions: Vec<Transaction>) -> Result<Self, BatchError> {
        if transactions.is_empty() {
            return Err(BatchError::Empty);
        }
        if let Some(tx) = transactions.iter().find(|tx| tx.quorum() == 0) {
            return Err(BatchError::ZeroQuorum(tx.reduced_hash()));
        }
        if transactions.iter().all(|tx| tx.signatures_count() == 0) {
            return Err(BatchError::NoSignatures);
        }
        if transactions.len() > 1 {
            let reduced: Vec<HashValue> =
                transactions.iter().map(Transaction::reduced_hash).collect();
            for tx in &transactions {
                let meta = tx
                    .batch_meta()
                    .ok_or_else(|| BatchError::MissingMeta(tx.reduced_hash()))?;
                if meta.reduced_hashes != reduced {
                    return Err(BatchError::MetaMismatch);
                }
            }
        } else if let Some(meta) = transactions[0].batch_meta() {
            if meta.reduced_hashes != vec![transactions[0].reduced_hash()] {
                return Err(BatchError::MetaMismatch);
            }
        }
        Ok(Self { transactions })
    }

    /// Single-transaction batch; batch meta is optional in this case.
    pub fn single(transaction: Transaction) -> Result<Self, BatchError> {
        Self::new(vec![transaction])
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

    pub fn identity(&self) -> BatchIdentity {
        self.transactions.iter().map(Transaction::reduced_hash).collect()
    }

    /// Full content hashes of the members, as recorded in blocks.
    pub fn tx_hashes(&self) -> Vec<HashValue> {
        self.transactions.iter().map(Transaction::hash).collect()
    }

    pub fn batch_type(&self) -> BatchType {
        self.transactions[0]
            .batch_meta()
            .map(|meta| meta.batch_type)
            .unwrap_or(BatchType::Ordered)
    }

    /// Complete once every member reached its signature quorum.
    pub fn is_complete(&self) -> bool {
        self.transactions.iter().all(Transaction::has_quorum)
    }

    /// Expired once every member is older than `expiration_ms`.
    pub fn is_expired(&self, now_ms: u64, expiration_ms: u64) -> bool {
        let cutoff = now_ms.saturating_sub(expiration_ms);
        self.transactions.iter().all(|tx| tx.created_time_ms() < cutoff)
    }

    /// Union the other copy's signatures into this one, member by member.
    /// Returns whether any signature set strictly grew. Both copies must
    /// share an identity.
    pub fn merge_signatures(&mut self, other: &Batch) -> bool {
        debug_assert_eq!(self.identity(), other.identity());
        let mut grew = false;
        for (own, theirs) in self.transactions.iter_mut().zip(other.transactions.iter()) {
            grew |= own.merge_signatures(theirs);
        }
        grew
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Batch {}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch({} txs, [{}])",
            self.transactions.len(),
            self.identity().iter().map(|h| h.to_hex()[..8].to_owned()).join(", ")
        )
    }
}

/// Split an ordered transaction sequence into its consecutive batch
/// groups.
///
/// A run of transactions sharing an identical meta whose reduced-hash list
/// is exactly the run forms one group; anything else is a singleton. This
/// is how flat wire bodies and proposal transaction lists are grouped back
/// into batches.
pub fn parse_batches(transactions: &[Transaction]) -> Vec<&[Transaction]> {
    let mut groups = Vec::new();
    let mut start = 0;
    while start < transactions.len() {
        let end = batch_run_end(transactions, start);
        groups.push(&transactions[start..end]);
        start = end;
    }
    groups
}

fn batch_run_end(transactions: &[Transaction], start: usize) -> usize {
    let meta = match transactions[start].batch_meta() {
        Some(meta) if meta.reduced_hashes.len() > 1 => meta,
        _ => return start + 1,
    };
    let run = match transactions.get(start..start + meta.reduced_hashes.len()) {
        Some(run) => run,
        None => return start + 1,
    };
    let matches = meta
        .reduced_hashes
        .iter()
        .zip_eq(run.iter())
        .all(|(expected, tx)| tx.batch_meta() == Some(meta) && tx.reduced_hash() == *expected);
    if matches {
        start + meta.reduced_hashes.len()
    } else {
        start + 1
    }
}

/// Rebuild validated batches out of a flat transaction sequence. Returns
/// the batches plus the number of transactions dropped because their
/// group failed structural validation.
pub fn reassemble_batches(transactions: Vec<Transaction>) -> (Vec<Batch>, usize) {
    let lengths: Vec<usize> =
        parse_batches(&transactions).into_iter().map(<[Transaction]>::len).collect();
    let mut members = transactions.into_iter();
    let mut batches = Vec::with_capacity(lengths.len());
    let mut dropped = 0;
    for length in lengths {
        let group: Vec<Transaction> = members.by_ref().take(length).collect();
        match Batch::new(group) {
            Ok(batch) => batches.push(batch),
            Err(_) => dropped += length,
        }
    }
    (batches, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::{PublicKey, Signature},
        transaction::{Command, TransactionPayload},
    };
    use claims::{assert_err, assert_ok};

    fn tx(tag: u8, quorum: u32, signers: usize) -> Transaction {
        let payload = TransactionPayload {
            creator: "alice@basalt".into(),
            created_time_ms: 1_000 + tag as u64,
            quorum,
            commands: vec![Command::new("set", vec![tag])],
        };
        let mut tx = Transaction::new(payload, vec![]);
        for signer in 0..signers {
            let key = PublicKey::from_u8(signer as u8 + 1);
            tx.add_signature(Signature::stub(key, &tx.reduced_hash()));
        }
        tx
    }

    fn with_meta(mut transactions: Vec<Transaction>, batch_type: BatchType) -> Vec<Transaction> {
        let reduced: Vec<HashValue> =
            transactions.iter().map(Transaction::reduced_hash).collect();
        for tx in &mut transactions {
            tx.set_batch_meta(Some(BatchMeta::new(batch_type, reduced.clone())));
        }
        transactions
    }

    #[test]
    fn validates_structure() {
        assert_err!(Batch::new(vec![]));
        assert_err!(Batch::single(tx(1, 1, 0)));
        assert_err!(Batch::new(vec![tx(1, 1, 1), tx(2, 1, 1)]));
        assert_ok!(Batch::new(with_meta(vec![tx(1, 1, 1), tx(2, 1, 1)], BatchType::Atomic)));
        assert_ok!(Batch::single(tx(3, 2, 1)));
    }

    #[test]
    fn identity_ignores_signatures() {
        let sparse = assert_ok!(Batch::single(tx(1, 2, 1)));
        let full = assert_ok!(Batch::single(tx(1, 2, 2)));
        assert_eq!(sparse, full);
        assert_eq!(sparse.identity(), full.identity());
        assert!(!sparse.is_complete());
        assert!(full.is_complete());
    }

    #[test]
    fn merge_unions_signatures() {
        let mut sparse = assert_ok!(Batch::single(tx(1, 2, 1)));
        let other = assert_ok!(Batch::single(tx(1, 2, 2)));
        assert!(sparse.merge_signatures(&other));
        assert!(sparse.is_complete());
        assert!(!sparse.merge_signatures(&other));
    }

    #[test]
    fn expiry_requires_every_member() {
        let batch =
            assert_ok!(Batch::new(with_meta(vec![tx(1, 1, 1), tx(200, 1, 1)], BatchType::Ordered)));
        // cutoff between the two creation times: only one member is stale
        assert!(!batch.is_expired(1_150 + 100, 100));
        assert!(batch.is_expired(10_000, 100));
    }

    #[test]
    fn parser_groups_runs_and_singletons() {
        let pair = with_meta(vec![tx(1, 1, 1), tx(2, 1, 1)], BatchType::Atomic);
        let mut flat = vec![tx(9, 1, 1)];
        flat.extend(pair.clone());
        flat.push(tx(10, 1, 1));

        let groups = parse_batches(&flat);
        assert_eq!(groups.iter().map(|g| g.len()).collect::<Vec<_>>(), vec![1, 2, 1]);

        // a truncated run degrades into singletons
        let truncated = vec![pair[0].clone()];
        let groups = parse_batches(&truncated);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
    }

    #[test]
    fn reassembly_drops_invalid_groups() {
        let pair = with_meta(vec![tx(1, 1, 1), tx(2, 1, 1)], BatchType::Atomic);
        let mut flat = pair;
        flat.push(tx(3, 1, 0)); // unsigned singleton fails validation

        let (batches, dropped) = reassemble_batches(flat);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(dropped, 1);
    }
}
