// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! The ordered proposal pipeline of the Basalt ledger node.
//!
//! Starting from client-submitted transaction batches, these components
//! produce a totally ordered chain of committed blocks under Byzantine
//! faults:
//!
//! * [`mst`]: multi-signature batch aggregation across peers,
//! * [`ordering_service`]: per-round proposal formation,
//! * [`connection_manager`]: batch and proposal-request routing by
//!   deterministic peer rotation,
//! * [`ordering_gate`]: the per-node front end driving the round cycle
//!   and stripping replays,
//! * [`presence_cache`]: authoritative committed/rejected/missing
//!   lookups over the block index,
//! * [`torii`]: the client-facing command service and status bus.
//!
//! [`pipeline_builder::OrderingPipeline`] wires all of it together; the
//! cryptographic primitives, storage engine, command executor and wire
//! codec are collaborators injected at that seam.

pub mod batch_cache;
pub mod config;
pub mod connection_manager;
pub mod counters;
pub mod error;
pub mod events;
pub mod mst;
pub mod network;
pub mod ordering_gate;
pub mod ordering_service;
pub mod pipeline_builder;
pub mod presence_cache;
pub mod torii;
pub mod util;

#[cfg(test)]
pub mod test_utils;


pub use config::OrderingConfig;
pub use events::{OrderingEvent, RoundOutcome, RoundSwitch};
pub use pipeline_builder::{OrderingPipeline, PipelineDeps};
