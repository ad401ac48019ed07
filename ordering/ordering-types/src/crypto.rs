// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! Structural carriers for keys and signatures.
//!
//! The cryptographic primitive library is an external collaborator: nothing
//! in the pipeline verifies a signature. Keys and signatures are carried,
//! compared and counted, never checked.

use crate::hash::HashValue;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ed25519-sized public key, used both as peer identity and as the
/// signatory key on transactions.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PublicKey([u8; PublicKey::LENGTH]);

impl PublicKey {
    pub const LENGTH: usize = 32;

    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn random_with_rng<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; Self::LENGTH];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Deterministic key for tests: every byte set to `byte`.
    pub const fn from_u8(byte: u8) -> Self {
        Self([byte; Self::LENGTH])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// A signature together with the key that produced it. Signature sets on
/// transactions are keyed by `public_key`, so one signatory contributes at
/// most one signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub public_key: PublicKey,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl Signature {
    pub fn new(public_key: PublicKey, payload: Vec<u8>) -> Self {
        Self { public_key, payload }
    }

    /// Placeholder signature derived from the key and the signed hash.
    /// Structurally unique per (key, hash) pair, which is all the pipeline
    /// ever relies on.
    pub fn stub(public_key: PublicKey, signed_hash: &HashValue) -> Self {
        let mut material = Vec::with_capacity(PublicKey::LENGTH + HashValue::LENGTH);
        material.extend_from_slice(public_key.as_bytes());
        material.extend_from_slice(signed_hash.as_bytes());
        Self { public_key, payload: HashValue::digest(&material).to_vec() }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(by {})", self.public_key)
    }
}
