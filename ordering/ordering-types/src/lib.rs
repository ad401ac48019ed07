// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! Data model for the Basalt ordered proposal pipeline.
//!
//! Everything in this crate is plain data: hashes, rounds, transactions,
//! batches, proposals, transaction statuses and the wire message bodies
//! exchanged between peers. No I/O, no async, no locking. The pipeline
//! crate (`basalt-ordering`) consumes these types and adds behavior.

pub mod batch;
pub mod crypto;
pub mod hash;
pub mod ledger_state;
pub mod message;
pub mod presence;
pub mod proposal;
pub mod round;
pub mod status;
pub mod transaction;

pub use batch::{Batch, BatchError, BatchMeta, BatchType};
pub use crypto::{PublicKey, Signature};
pub use hash::HashValue;
pub use ledger_state::{LedgerState, Peer};
pub use presence::PresenceStatus;
pub use proposal::Proposal;
pub use round::{BlockRound, RejectRound, Round, FIRST_REJECT_ROUND};
pub use status::{StatusResponse, TxStatus};
pub use transaction::{AccountId, Command, Transaction, TransactionPayload};
