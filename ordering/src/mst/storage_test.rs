// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use super::MstStorage;
use crate::{
    mst::state::DefaultCompleter,
    test_utils::{signed_tx, singleton_batch},
};
use basalt_ordering_types::{Batch, PublicKey};
use std::sync::Arc;

const EXPIRATION_MS: u64 = 5_000;

fn storage() -> MstStorage {
    MstStorage::new(Arc::new(DefaultCompleter::new(EXPIRATION_MS)))
}

fn batch(tag: u8, quorum: u32, signers: &[u8]) -> Batch {
    singleton_batch(signed_tx("storage@basalt", quorum, signers, 100_000 + tag as u64))
}

#[test]
fn own_updates_are_tracked() {
    let storage = storage();
    let update = storage.update_own(batch(1, 2, &[1]));
    assert_eq!(update.updated.len(), 1);
    assert_eq!(storage.pending_count(), 1);
    assert!(storage.contains_batch(&batch(1, 2, &[1])));
}

#[test]
fn apply_reaches_completion_through_own_state() {
    let storage = storage();
    let peer = PublicKey::from_u8(9);
    storage.update_own(batch(1, 2, &[1]));

    let update = storage.apply(peer, vec![batch(1, 2, &[2])]);
    assert_eq!(update.completed.len(), 1);
    assert_eq!(storage.pending_count(), 0);
}

#[test]
fn diff_excludes_what_the_peer_already_has() {
    let storage = storage();
    let peer = PublicKey::from_u8(9);
    storage.update_own(batch(1, 3, &[1]));
    storage.update_own(batch(2, 3, &[1]));
    storage.apply(peer, vec![batch(2, 3, &[2])]);

    let diff = storage.diff_state(&peer, 100_000);
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0], batch(1, 3, &[1]));
}

#[test]
fn diff_to_unknown_peer_is_everything_pending() {
    let storage = storage();
    storage.update_own(batch(1, 3, &[1]));
    let diff = storage.diff_state(&PublicKey::from_u8(3), 100_000);
    assert_eq!(diff.len(), 1);
}

#[test]
fn diff_drops_expired_batches() {
    let storage = storage();
    storage.update_own(batch(1, 3, &[1]));
    let far_future = 100_000 + EXPIRATION_MS + 10_000;
    assert!(storage.diff_state(&PublicKey::from_u8(3), far_future).is_empty());
}

#[test]
fn extract_expired_empties_own_state() {
    let storage = storage();
    storage.update_own(batch(1, 3, &[1]));
    storage.update_own(batch(2, 3, &[1]));

    let expired = storage.extract_expired(100_000 + EXPIRATION_MS + 10_000);
    assert_eq!(expired.len(), 2);
    assert_eq!(storage.pending_count(), 0);
}

#[test]
fn whats_new_is_relative_to_own_state() {
    let storage = storage();
    storage.update_own(batch(1, 3, &[1]));

    let novel = storage.whats_new(&[batch(1, 3, &[2]), batch(2, 3, &[2])]);
    assert_eq!(novel.len(), 1);
    assert_eq!(novel[0], batch(2, 3, &[2]));
}
