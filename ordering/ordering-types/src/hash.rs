// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use rand::{rngs::OsRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Output of the ledger content hash function (SHA3-256).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HashValue([u8; HashValue::LENGTH]);

#[derive(Debug, Error)]
#[error("invalid hash literal: {0}")]
pub struct HashParseError(String);

impl HashValue {
    /// Length of the hash in bytes.
    pub const LENGTH: usize = 32;

    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0; Self::LENGTH])
    }

    /// Hash arbitrary bytes with SHA3-256.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        let output = hasher.finalize();
        let mut bytes = [0u8; Self::LENGTH];
        bytes.copy_from_slice(output.as_slice());
        Self(bytes)
    }

    /// Hash the canonical binary encoding of a serializable value.
    pub fn digest_of<T: Serialize>(value: &T) -> Self {
        let bytes = bcs::to_bytes(value).expect("serialization of in-memory value cannot fail");
        Self::digest(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Uniformly random hash, for tests and nonce-like uses.
    pub fn random() -> Self {
        Self::random_with_rng(&mut OsRng)
    }

    pub fn random_with_rng<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; Self::LENGTH];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Deterministic filler value for tests: every byte set to `byte`.
    pub const fn from_u8(byte: u8) -> Self {
        Self([byte; Self::LENGTH])
    }
}

impl AsRef<[u8]> for HashValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashValue({})", self.to_hex())
    }
}

impl FromStr for HashValue {
    type Err = HashParseError;

    fn from_str(literal: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(literal).map_err(|e| HashParseError(e.to_string()))?;
        if raw.len() != Self::LENGTH {
            return Err(HashParseError(format!("expected {} bytes, got {}", Self::LENGTH, raw.len())));
        }
        let mut bytes = [0u8; Self::LENGTH];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

/// Random value of any type with a `Standard` distribution. Convenience for tests.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill(&mut bytes[..]);
    bytes
}
