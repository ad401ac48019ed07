// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::StorageError;
use basalt_ordering_types::{Batch, HashValue, PresenceStatus};
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

#[cfg(test)]
#[path = "presence_cache_test.rs"]
mod presence_cache_test;

/// The ledger's block index, queried for the recorded fate of a
/// transaction hash. Implemented by the storage engine outside this
/// crate.
#[cfg_attr(test, automock)]
pub trait PresenceBackend: Send + Sync {
    fn transaction_status(&self, hash: &HashValue) -> Result<PresenceStatus, StorageError>;
}

/// Authoritative lookup of whether a transaction is committed, rejected
/// or missing from the ledger.
///
/// An `Err` means the backing store itself failed, which callers must
/// treat differently from `Missing`: the gate drops such transactions
/// conservatively, the command service reports `NotReceived`.
pub trait PresenceReader: Send + Sync {
    fn check(&self, hash: &HashValue) -> Result<PresenceStatus, StorageError>;

    fn check_batch(&self, batch: &Batch) -> Result<Vec<PresenceStatus>, StorageError> {
        batch.transactions().iter().map(|tx| self.check(&tx.hash())).collect()
    }
}

/// [`PresenceReader`] over a [`PresenceBackend`], memoizing terminal
/// statuses in a bounded LRU. `Missing` is never cached: a missing
/// transaction may commit a round later, while a committed or rejected
/// one can never change fate again.
pub struct StoragePresenceCache {
    backend: Arc<dyn PresenceBackend>,
    memo: Mutex<LruCache<HashValue, PresenceStatus>>,
}

impl StoragePresenceCache {
    pub fn new(backend: Arc<dyn PresenceBackend>, capacity: usize) -> Self {
        Self { backend, memo: Mutex::new(LruCache::new(capacity)) }
    }
}

impl PresenceReader for StoragePresenceCache {
    fn check(&self, hash: &HashValue) -> Result<PresenceStatus, StorageError> {
        if let Some(status) = self.memo.lock().get(hash) {
            return Ok(*status);
        }
        let status = self.backend.transaction_status(hash)?;
        if status.is_already_processed() {
            self.memo.lock().put(*hash, status);
        }
        Ok(status)
    }
}
