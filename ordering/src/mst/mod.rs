// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

//! Multi-signature transaction aggregation: collecting the per-transaction
//! signature quorum across peers before a batch may be ordered.

pub mod processor;
pub mod propagation;
pub mod relay;
pub mod state;
pub mod storage;

pub use processor::{MstOutputs, MstProcessor};
pub use propagation::{GossipPropagationStrategy, PropagationStrategy};
pub use state::{Completer, DefaultCompleter, MstState, StateUpdateResult};
pub use storage::MstStorage;
