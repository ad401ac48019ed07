// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use thiserror::Error;

/// Failures of the presence-cache backing store. Distinct from a missing
/// transaction: a missing transaction is a successful lookup.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("presence store unavailable: {0}")]
    Unavailable(String),
}

/// Failures on the peer-to-peer paths. Never fatal: callers log and move
/// on, the pipeline must outlive any peer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("no peers assigned for role {0}")]
    NoPeers(&'static str),
}

/// Failures raised while serving inbound peer requests. Batches for
/// closed rounds are not an error: the ordering service discards them
/// silently.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServerError {
    #[error("message failed structural validation: {0} transactions rejected")]
    StatelessValidation(usize),
}
