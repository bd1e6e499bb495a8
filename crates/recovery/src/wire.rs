//! Wire protocol for the recovery request/acknowledge channel.
//!
//! Every exchange is a synchronous round trip: the source sends one
//! [`RecoveryRequest`] and blocks until the matching [`RecoveryResponse`]
//! arrives. Chunk payloads are `Cow` so the sending side can borrow its
//! read buffer while the receiving side deserializes into owned bytes.

use std::borrow::Cow;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use coral_primitives::{Bucket, Digest, SessionId, ShardId};

/// Identifies one in-flight file transfer within a session. Allocated by
/// the target when it acknowledges a `StartTransfer`.
#[derive(
    Eq, Copy, Hash, Clone, Debug, PartialEq, Ord, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct TransferId(pub u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requests the source issues to the target.
#[derive(Debug, BorshSerialize, BorshDeserialize)]
pub enum RecoveryRequest<'a> {
    /// Open a recovery session for one shard.
    StartRecovery {
        session_id: SessionId,
        shard: ShardId,
    },
    /// Ask for the digests the target holds in one bucket.
    StartPrefixSync {
        session_id: SessionId,
        shard: ShardId,
        bucket: Bucket,
    },
    /// Batched delete of blobs the source no longer holds.
    DeleteFiles {
        session_id: SessionId,
        digests: Vec<Digest>,
    },
    /// First chunk of a blob, with its destination path and declared size.
    StartTransfer {
        session_id: SessionId,
        relative_path: String,
        payload: Cow<'a, [u8]>,
        total_size: u64,
    },
    /// A follow-up chunk; `last` marks the final chunk of the transfer.
    TransferChunk {
        session_id: SessionId,
        transfer_id: TransferId,
        payload: Cow<'a, [u8]>,
        last: bool,
    },
    /// Close the session after the race window has drained.
    FinalizeRecovery { session_id: SessionId },
}

impl RecoveryRequest<'_> {
    #[must_use]
    pub fn into_owned(self) -> RecoveryRequest<'static> {
        match self {
            Self::StartRecovery { session_id, shard } => {
                RecoveryRequest::StartRecovery { session_id, shard }
            }
            Self::StartPrefixSync {
                session_id,
                shard,
                bucket,
            } => RecoveryRequest::StartPrefixSync {
                session_id,
                shard,
                bucket,
            },
            Self::DeleteFiles {
                session_id,
                digests,
            } => RecoveryRequest::DeleteFiles {
                session_id,
                digests,
            },
            Self::StartTransfer {
                session_id,
                relative_path,
                payload,
                total_size,
            } => RecoveryRequest::StartTransfer {
                session_id,
                relative_path,
                payload: Cow::Owned(payload.into_owned()),
                total_size,
            },
            Self::TransferChunk {
                session_id,
                transfer_id,
                payload,
                last,
            } => RecoveryRequest::TransferChunk {
                session_id,
                transfer_id,
                payload: Cow::Owned(payload.into_owned()),
                last,
            },
            Self::FinalizeRecovery { session_id } => {
                RecoveryRequest::FinalizeRecovery { session_id }
            }
        }
    }
}

/// Responses the target returns, one per request.
#[derive(Debug, BorshSerialize, BorshDeserialize)]
pub enum RecoveryResponse {
    Ack,
    /// Digests present at the target for the requested bucket.
    DigestSet(Vec<Digest>),
    /// Transfer id all follow-up chunks of this file must carry.
    TransferStarted { transfer_id: TransferId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_transfer_roundtrips_through_borsh() {
        let request = RecoveryRequest::StartTransfer {
            session_id: SessionId(7),
            relative_path: "a7/abcdef".to_owned(),
            payload: Cow::Borrowed(&[1, 2, 3][..]),
            total_size: 9000,
        };

        let bytes = borsh::to_vec(&request).expect("serialize");
        let decoded: RecoveryRequest<'static> = borsh::from_slice(&bytes).expect("deserialize");

        match decoded {
            RecoveryRequest::StartTransfer {
                session_id,
                relative_path,
                payload,
                total_size,
            } => {
                assert_eq!(session_id, SessionId(7));
                assert_eq!(relative_path, "a7/abcdef");
                assert_eq!(&*payload, &[1, 2, 3]);
                assert_eq!(total_size, 9000);
            }
            unexpected => panic!("wrong variant: {unexpected:?}"),
        }
    }

    #[test]
    fn digest_set_roundtrips_through_borsh() {
        let digests = vec![Digest::hash(b"a"), Digest::hash(b"b")];
        let response = RecoveryResponse::DigestSet(digests.clone());

        let bytes = borsh::to_vec(&response).expect("serialize");
        let decoded: RecoveryResponse = borsh::from_slice(&bytes).expect("deserialize");

        match decoded {
            RecoveryResponse::DigestSet(got) => assert_eq!(got, digests),
            unexpected => panic!("wrong variant: {unexpected:?}"),
        }
    }
}
