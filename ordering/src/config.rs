// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of the ordering pipeline. Every field has a default, so
/// a partial YAML file (or none at all) yields a working node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderingConfig {
    /// Maximum transactions packed into one proposal.
    pub transaction_limit: usize,
    /// Retained-proposal window of the ordering service; older proposals
    /// stop being servable.
    pub number_of_proposals: usize,
    /// Time between round switches absent external events. Consumed by
    /// the consensus driver above this crate.
    pub proposal_delay_ms: u64,
    /// Time a node waits before voting on a proposal. Consumed by the
    /// consensus driver above this crate.
    pub vote_delay_ms: u64,
    /// Per-RPC deadline when requesting a proposal from the issuer.
    pub proposal_request_timeout_ms: u64,
    /// Upper bound on the time between rounds.
    pub max_rounds_delay_ms: u64,
    /// Non-final status-stream timeout, expressed in rounds of
    /// `max_rounds_delay_ms` each.
    pub stale_stream_max_rounds: u32,
    /// Pending slots in the MST-to-gate relay before the oldest completed
    /// batch is dropped.
    pub relay_capacity: usize,
    /// Entries retained by caches keyed by transaction hash (command
    /// service statuses, presence memoization).
    pub status_cache_capacity: usize,
    /// Capacity of the bounded pipeline channels.
    pub channel_capacity: usize,
    pub mst: MstConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MstConfig {
    /// Age after which a pending batch is dropped from MST state.
    pub expiration_ms: u64,
    /// Period of the gossip propagation strategy.
    pub gossip_interval_ms: u64,
    /// Peers contacted per gossip emission.
    pub gossip_amount_per_once: usize,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            transaction_limit: 500,
            number_of_proposals: 3,
            proposal_delay_ms: 3_000,
            vote_delay_ms: 1_000,
            proposal_request_timeout_ms: 250,
            max_rounds_delay_ms: 6_000,
            stale_stream_max_rounds: 2,
            relay_capacity: 128,
            status_cache_capacity: 10_000,
            channel_capacity: 256,
            mst: MstConfig::default(),
        }
    }
}

impl Default for MstConfig {
    fn default() -> Self {
        Self {
            expiration_ms: 10 * 60 * 1_000,
            gossip_interval_ms: 5_000,
            gossip_amount_per_once: 2,
        }
    }
}

impl OrderingConfig {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn proposal_request_timeout(&self) -> Duration {
        Duration::from_millis(self.proposal_request_timeout_ms)
    }

    /// Time a status stream may sit between non-final statuses before it
    /// is considered stale and closed.
    pub fn stale_stream_timeout(&self) -> Duration {
        Duration::from_millis(self.max_rounds_delay_ms * self.stale_stream_max_rounds as u64)
    }

    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.mst.gossip_interval_ms)
    }
}
