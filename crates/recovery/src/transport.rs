//! Transport seam between the recovery core and the node-to-node channel.
//!
//! Production nodes back this with their peer stream layer; tests back it
//! with an in-memory channel pair. Implementations own the per-request
//! timeout budget and report expiry as [`TransportError::Timeout`].

use async_trait::async_trait;
use coral_primitives::Digest;

use crate::error::TransportError;
use crate::wire::{RecoveryRequest, RecoveryResponse, TransferId};

/// One synchronous request/acknowledge round trip to the target node.
#[async_trait]
pub trait RecoveryTransport: Send + Sync {
    async fn request(
        &self,
        request: RecoveryRequest<'_>,
    ) -> Result<RecoveryResponse, TransportError>;
}

fn rejected(expected: &str, got: &RecoveryResponse) -> TransportError {
    TransportError::Rejected {
        reason: format!("expected {expected}, got {got:?}"),
    }
}

pub(crate) fn expect_ack(response: RecoveryResponse) -> Result<(), TransportError> {
    match response {
        RecoveryResponse::Ack => Ok(()),
        other => Err(rejected("ack", &other)),
    }
}

pub(crate) fn expect_digest_set(response: RecoveryResponse) -> Result<Vec<Digest>, TransportError> {
    match response {
        RecoveryResponse::DigestSet(digests) => Ok(digests),
        other => Err(rejected("digest set", &other)),
    }
}

pub(crate) fn expect_transfer_started(
    response: RecoveryResponse,
) -> Result<TransferId, TransportError> {
    match response {
        RecoveryResponse::TransferStarted { transfer_id } => Ok(transfer_id),
        other => Err(rejected("transfer id", &other)),
    }
}
