// Copyright © Basalt Labs
// SPDX-License-Identifier: Apache-2.0

use crate::{
    events::{CommitNotification, VerifiedProposalOutcome},
    torii::status_bus::StatusBus,
};
use basalt_ordering_types::{Batch, StatusResponse, TxStatus};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[cfg(test)]
#[path = "status_processor_test.rs"]
mod status_processor_test;

/// Pipeline progress feeds consumed by the status processor.
pub struct StatusStreams {
    /// Batches whose signature sets grew without completing.
    pub state_updates: mpsc::UnboundedReceiver<Vec<Batch>>,
    /// Batches that reached their full signature quorum.
    pub prepared: mpsc::UnboundedReceiver<Batch>,
    /// Batches dropped from MST state by age.
    pub expired: mpsc::UnboundedReceiver<Batch>,
    /// Stateful validation outcomes for requested proposals.
    pub verified: mpsc::Receiver<VerifiedProposalOutcome>,
    /// Transaction fates settled by block commits.
    pub commits: mpsc::UnboundedReceiver<CommitNotification>,
}

/// Translates pipeline progress into status-bus publications. Everything
/// the node externally admits to about a transaction's journey funnels
/// through here or through the command service's submission statuses.
pub async fn run_status_processor(bus: StatusBus, mut streams: StatusStreams) {
    loop {
        tokio::select! {
            Some(batches) = streams.state_updates.recv() => {
                for batch in batches {
                    publish_each(&bus, &batch, TxStatus::MstPending);
                }
            }
            Some(batch) = streams.prepared.recv() => {
                debug!(batch = ?batch, "batch collected enough signatures");
                publish_each(&bus, &batch, TxStatus::EnoughSignaturesCollected);
            }
            Some(batch) = streams.expired.recv() => {
                publish_each(&bus, &batch, TxStatus::MstExpired);
            }
            Some(outcome) = streams.verified.recv() => handle_verified(&bus, outcome),
            Some(fate) = streams.commits.recv() => handle_commit(&bus, fate),
            else => break,
        }
    }
    info!("status processor stopped");
}

fn publish_each(bus: &StatusBus, batch: &Batch, status: TxStatus) {
    for tx in batch.transactions() {
        bus.publish(StatusResponse::new(tx.hash(), status));
    }
}

fn handle_verified(bus: &StatusBus, outcome: VerifiedProposalOutcome) {
    for error in outcome.errors {
        debug!(tx = %error.tx_hash, command = %error.command_name, "stateful validation failure");
        bus.publish(
            StatusResponse::new(error.tx_hash, TxStatus::StatefulFailed)
                .with_error(error.message)
                .with_failed_command(error.command_name, error.command_index, error.error_code),
        );
    }
    for tx in outcome.proposal.transactions() {
        bus.publish(StatusResponse::new(tx.hash(), TxStatus::StatefulValid));
    }
}

fn handle_commit(bus: &StatusBus, fate: CommitNotification) {
    for hash in fate.committed {
        bus.publish(StatusResponse::new(hash, TxStatus::Committed));
    }
    for hash in fate.rejected {
        bus.publish(StatusResponse::new(hash, TxStatus::Rejected));
    }
}
