// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::hash::HashValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a transaction in its processing lifecycle.
///
/// Statuses form a partial order through [`TxStatus::priority`]: a status
/// may only ever replace one of strictly lower priority, which makes the
/// per-transaction status sequence monotone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    NotReceived,
    StatelessFailed,
    StatelessValid,
    MstPending,
    MstExpired,
    EnoughSignaturesCollected,
    StatefulFailed,
    StatefulValid,
    Rejected,
    Committed,
}

impl TxStatus {
    pub fn priority(self) -> u8 {
        match self {
            Self::NotReceived => 0,
            Self::StatelessFailed | Self::StatelessValid => 1,
            Self::MstPending => 2,
            Self::MstExpired | Self::EnoughSignaturesCollected => 3,
            Self::StatefulFailed | Self::StatefulValid => 4,
            Self::Rejected | Self::Committed => 5,
        }
    }

    /// Final statuses end status streams: nothing can follow them.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            Self::Committed | Self::Rejected | Self::StatelessFailed | Self::MstExpired
        )
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotReceived => "NOT_RECEIVED",
            Self::StatelessFailed => "STATELESS_VALIDATION_FAILED",
            Self::StatelessValid => "STATELESS_VALIDATION_SUCCESS",
            Self::MstPending => "MST_PENDING",
            Self::MstExpired => "MST_EXPIRED",
            Self::EnoughSignaturesCollected => "ENOUGH_SIGNATURES_COLLECTED",
            Self::StatefulFailed => "STATEFUL_VALIDATION_FAILED",
            Self::StatefulValid => "STATEFUL_VALIDATION_SUCCESS",
            Self::Rejected => "REJECTED",
            Self::Committed => "COMMITTED",
        };
        f.write_str(name)
    }
}

/// One status observation for one transaction, as published on the status
/// bus and returned from status queries. Failure details are attached for
/// stateless and stateful validation failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub tx_hash: HashValue,
    pub status: TxStatus,
    pub error_message: Option<String>,
    pub failed_command_name: Option<String>,
    pub failed_command_index: Option<u32>,
    pub error_code: Option<u32>,
}

impl StatusResponse {
    pub fn new(tx_hash: HashValue, status: TxStatus) -> Self {
        Self {
            tx_hash,
            status,
            error_message: None,
            failed_command_name: None,
            failed_command_index: None,
            error_code: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_failed_command(
        mut self,
        name: impl Into<String>,
        index: u32,
        error_code: u32,
    ) -> Self {
        self.failed_command_name = Some(name.into());
        self.failed_command_index = Some(index);
        self.error_code = Some(error_code);
        self
    }

    pub fn priority(&self) -> u8 {
        self.status.priority()
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}
