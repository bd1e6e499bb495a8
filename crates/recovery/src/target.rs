//! Target-side session handler.
//!
//! Applies the source's requests against local storage. A blob becomes
//! visible only when its last chunk arrives; transfers still pending at
//! finalize are discarded, so no partially written blob survives a session.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use coral_blobs::{ContentStore, FileSystemStore, StoreError};
use coral_primitives::{Bucket, Digest, SessionId};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::wire::{RecoveryRequest, RecoveryResponse, TransferId};

/// Storage surface the target writes through.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn digests_in_bucket(&self, bucket: Bucket) -> Result<HashSet<Digest>, StoreError>;

    async fn insert(&self, digest: Digest, data: &[u8]) -> Result<(), StoreError>;

    async fn remove(&self, digest: Digest) -> Result<(), StoreError>;
}

#[async_trait]
impl TargetStore for FileSystemStore {
    async fn digests_in_bucket(&self, bucket: Bucket) -> Result<HashSet<Digest>, StoreError> {
        ContentStore::digests_in_bucket(self, bucket).await
    }

    async fn insert(&self, digest: Digest, data: &[u8]) -> Result<(), StoreError> {
        self.put(digest, data).await
    }

    async fn remove(&self, digest: Digest) -> Result<(), StoreError> {
        self.delete(digest).await
    }
}

/// Rejections the target answers with. The source observes these as
/// transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("no recovery session is active")]
    NoSession,
    #[error("session mismatch: active {active}, got {got}")]
    SessionMismatch { active: SessionId, got: SessionId },
    #[error("unknown transfer id: {transfer_id}")]
    UnknownTransfer { transfer_id: TransferId },
    #[error("transfer `{path}`: declared {declared} bytes, received {received}")]
    SizeMismatch {
        path: String,
        declared: u64,
        received: u64,
    },
    #[error("cannot derive a digest from path `{path}`")]
    InvalidPath { path: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
struct PendingTransfer {
    relative_path: String,
    total_size: u64,
    received: Vec<u8>,
}

#[derive(Debug, Default)]
struct TargetState {
    session: Option<SessionId>,
    next_transfer_id: u64,
    transfers: HashMap<TransferId, PendingTransfer>,
}

impl TargetState {
    fn check_session(&self, got: SessionId) -> Result<(), TargetError> {
        match self.session {
            None => Err(TargetError::NoSession),
            Some(active) if active != got => Err(TargetError::SessionMismatch { active, got }),
            Some(_) => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct RecoveryTarget<S> {
    store: S,
    state: Mutex<TargetState>,
}

impl<S: TargetStore> RecoveryTarget<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Mutex::new(TargetState::default()),
        }
    }

    /// Applies one request, returning the response the source is blocked on.
    pub async fn handle(
        &self,
        request: RecoveryRequest<'_>,
    ) -> Result<RecoveryResponse, TargetError> {
        match request {
            RecoveryRequest::StartRecovery { session_id, shard } => {
                debug!(session_id=%session_id, shard=%shard, "recovery session opened");

                let mut state = self.state.lock().await;
                *state = TargetState {
                    session: Some(session_id),
                    ..TargetState::default()
                };

                Ok(RecoveryResponse::Ack)
            }

            RecoveryRequest::StartPrefixSync {
                session_id, bucket, ..
            } => {
                self.state.lock().await.check_session(session_id)?;

                let digests = self.store.digests_in_bucket(bucket).await?;

                Ok(RecoveryResponse::DigestSet(digests.into_iter().collect()))
            }

            RecoveryRequest::DeleteFiles {
                session_id,
                digests,
            } => {
                self.state.lock().await.check_session(session_id)?;

                for digest in digests {
                    self.store.remove(digest).await?;
                }

                Ok(RecoveryResponse::Ack)
            }

            RecoveryRequest::StartTransfer {
                session_id,
                relative_path,
                payload,
                total_size,
            } => {
                let mut state = self.state.lock().await;
                state.check_session(session_id)?;

                let transfer_id = TransferId(state.next_transfer_id);
                state.next_transfer_id += 1;

                let _previous = state.transfers.insert(
                    transfer_id,
                    PendingTransfer {
                        relative_path,
                        total_size,
                        received: payload.into_owned(),
                    },
                );

                Ok(RecoveryResponse::TransferStarted { transfer_id })
            }

            RecoveryRequest::TransferChunk {
                session_id,
                transfer_id,
                payload,
                last,
            } => {
                let mut state = self.state.lock().await;
                state.check_session(session_id)?;

                let transfer = state
                    .transfers
                    .get_mut(&transfer_id)
                    .ok_or(TargetError::UnknownTransfer { transfer_id })?;

                transfer.received.extend_from_slice(&payload);

                if !last {
                    return Ok(RecoveryResponse::Ack);
                }

                let transfer = state
                    .transfers
                    .remove(&transfer_id)
                    .ok_or(TargetError::UnknownTransfer { transfer_id })?;
                drop(state);

                if transfer.received.len() as u64 != transfer.total_size {
                    return Err(TargetError::SizeMismatch {
                        path: transfer.relative_path,
                        declared: transfer.total_size,
                        received: transfer.received.len() as u64,
                    });
                }

                let digest = digest_from_path(&transfer.relative_path)?;
                self.store.insert(digest, &transfer.received).await?;

                Ok(RecoveryResponse::Ack)
            }

            RecoveryRequest::FinalizeRecovery { session_id } => {
                let mut state = self.state.lock().await;
                state.check_session(session_id)?;

                if !state.transfers.is_empty() {
                    warn!(
                        session_id=%session_id,
                        pending=state.transfers.len(),
                        "discarding transfers still pending at finalize",
                    );
                }

                *state = TargetState::default();

                debug!(session_id=%session_id, "recovery session finalized");

                Ok(RecoveryResponse::Ack)
            }
        }
    }
}

/// The destination path's file name is the blob's digest.
fn digest_from_path(path: &str) -> Result<Digest, TargetError> {
    let name = path.rsplit('/').next().unwrap_or(path);

    name.parse().map_err(|_| TargetError::InvalidPath {
        path: path.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[derive(Debug, Default)]
    struct MemStore {
        blobs: Mutex<HashMap<Digest, Vec<u8>>>,
    }

    #[async_trait]
    impl TargetStore for MemStore {
        async fn digests_in_bucket(&self, bucket: Bucket) -> Result<HashSet<Digest>, StoreError> {
            Ok(self
                .blobs
                .lock()
                .await
                .keys()
                .filter(|digest| digest.bucket() == bucket)
                .copied()
                .collect())
        }

        async fn insert(&self, digest: Digest, data: &[u8]) -> Result<(), StoreError> {
            let _ = self.blobs.lock().await.insert(digest, data.to_vec());
            Ok(())
        }

        async fn remove(&self, digest: Digest) -> Result<(), StoreError> {
            let _ = self.blobs.lock().await.remove(&digest);
            Ok(())
        }
    }

    const SESSION: SessionId = SessionId(1);

    async fn target_with_session() -> RecoveryTarget<MemStore> {
        let target = RecoveryTarget::new(MemStore::default());
        let _ack = target
            .handle(RecoveryRequest::StartRecovery {
                session_id: SESSION,
                shard: coral_primitives::ShardId::new("blobs", 0),
            })
            .await
            .expect("start recovery");
        target
    }

    fn path_for(digest: Digest) -> String {
        format!("{}/{}", digest.bucket(), digest)
    }

    #[tokio::test]
    async fn requests_without_a_session_are_rejected() {
        let target = RecoveryTarget::new(MemStore::default());

        let result = target
            .handle(RecoveryRequest::FinalizeRecovery {
                session_id: SESSION,
            })
            .await;

        assert!(matches!(result, Err(TargetError::NoSession)));
    }

    #[tokio::test]
    async fn chunk_for_unknown_transfer_is_rejected() {
        let target = target_with_session().await;

        let result = target
            .handle(RecoveryRequest::TransferChunk {
                session_id: SESSION,
                transfer_id: TransferId(99),
                payload: Cow::Borrowed(&[1, 2][..]),
                last: false,
            })
            .await;

        assert!(matches!(
            result,
            Err(TargetError::UnknownTransfer { transfer_id }) if transfer_id == TransferId(99)
        ));
    }

    #[tokio::test]
    async fn blob_becomes_visible_only_after_last_chunk() {
        let target = target_with_session().await;

        let content = vec![9; 300];
        let digest = Digest::hash(&content);

        let response = target
            .handle(RecoveryRequest::StartTransfer {
                session_id: SESSION,
                relative_path: path_for(digest),
                payload: Cow::Borrowed(&content[..200]),
                total_size: 300,
            })
            .await
            .expect("start transfer");
        let RecoveryResponse::TransferStarted { transfer_id } = response else {
            panic!("expected transfer id, got {response:?}");
        };

        let visible = target
            .store
            .digests_in_bucket(digest.bucket())
            .await
            .expect("enumerate");
        assert!(
            !visible.contains(&digest),
            "partial transfer must not be visible"
        );

        let _ack = target
            .handle(RecoveryRequest::TransferChunk {
                session_id: SESSION,
                transfer_id,
                payload: Cow::Borrowed(&content[200..]),
                last: true,
            })
            .await
            .expect("final chunk");

        let blobs = target.store.blobs.lock().await;
        assert_eq!(blobs.get(&digest), Some(&content), "committed in full");
    }

    #[tokio::test]
    async fn short_transfer_is_rejected_on_last_chunk() {
        let target = target_with_session().await;

        let digest = Digest::hash(b"whatever");
        let response = target
            .handle(RecoveryRequest::StartTransfer {
                session_id: SESSION,
                relative_path: path_for(digest),
                payload: Cow::Borrowed(&[1, 2, 3][..]),
                total_size: 10,
            })
            .await
            .expect("start transfer");
        let RecoveryResponse::TransferStarted { transfer_id } = response else {
            panic!("expected transfer id, got {response:?}");
        };

        let result = target
            .handle(RecoveryRequest::TransferChunk {
                session_id: SESSION,
                transfer_id,
                payload: Cow::Borrowed(&[][..]),
                last: true,
            })
            .await;

        assert!(matches!(
            result,
            Err(TargetError::SizeMismatch { declared: 10, received: 3, .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_blobs() {
        let target = target_with_session().await;

        let digest = Digest::hash(b"to delete");
        target
            .store
            .insert(digest, b"to delete")
            .await
            .expect("seed");

        let _ack = target
            .handle(RecoveryRequest::DeleteFiles {
                session_id: SESSION,
                digests: vec![digest],
            })
            .await
            .expect("delete");

        assert!(target.store.blobs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn finalize_discards_pending_transfers() {
        let target = target_with_session().await;

        let digest = Digest::hash(b"unfinished");
        let _response = target
            .handle(RecoveryRequest::StartTransfer {
                session_id: SESSION,
                relative_path: path_for(digest),
                payload: Cow::Borrowed(&[1][..]),
                total_size: 100,
            })
            .await
            .expect("start transfer");

        let _ack = target
            .handle(RecoveryRequest::FinalizeRecovery {
                session_id: SESSION,
            })
            .await
            .expect("finalize");

        assert!(
            target.store.blobs.lock().await.is_empty(),
            "unfinished transfer never became visible"
        );
    }
}
