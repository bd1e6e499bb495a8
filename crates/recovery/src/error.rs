//! Failure taxonomy for a recovery session.
//!
//! Every variant is fatal to the session. The orchestrator never retries;
//! the caller restarts the whole session if it wants another attempt.

use coral_blobs::StoreError;
use coral_primitives::{Digest, ShardId};
use thiserror::Error;

/// Failures of the request/acknowledge channel between the two nodes.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection to target closed")]
    Closed,
    #[error("target rejected request: {reason}")]
    Rejected { reason: String },
}

/// Anything that can abort a recovery session.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to read blob `{digest}` from local store")]
    BlobRead {
        digest: Digest,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("shard {shard} closed during transfer")]
    ShardClosed { shard: ShardId },

    #[error("transfer worker terminated abnormally")]
    WorkerLost(#[source] tokio::task::JoinError),
}
