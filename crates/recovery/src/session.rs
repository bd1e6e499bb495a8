//! The recovery session state machine.
//!
//! One orchestrator drives one session end to end:
//!
//! ```text
//! NotStarted → Syncing(bucket 00..ff) → AwaitingRaceWindow → Finalizing → Done
//!                                  └───────── Failed (from any state) ─────┘
//! ```
//!
//! Buckets are walked strictly sequentially to bound memory and failure
//! blast radius; pushes within a bucket run concurrently. Deletes for a
//! bucket go out only after all of its pushes succeeded. Any unrecovered
//! error fails the whole session; the caller restarts from scratch.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Instant;

use coral_blobs::ContentStore;
use coral_primitives::{Bucket, SessionId, ShardId};
use tracing::{debug, error};

use crate::config::RecoveryConfig;
use crate::error::RecoveryError;
use crate::reconcile::reconcile_bucket;
use crate::scheduler::{push_all, TransferPool};
use crate::shard::ShardHandle;
use crate::tracker::TransferTracker;
use crate::transport::{expect_ack, RecoveryTransport};
use crate::wire::RecoveryRequest;

#[derive(Eq, Copy, Clone, Debug, PartialEq)]
pub enum RecoveryPhase {
    NotStarted,
    Syncing { bucket: Bucket },
    AwaitingRaceWindow,
    Finalizing,
    Done,
    Failed,
}

/// One run of the protocol. Purely in-memory; lives from the start of the
/// handshake until finalize succeeds or an error aborts it.
#[derive(Clone, Debug)]
pub struct RecoverySession {
    id: SessionId,
    shard: ShardId,
    phase: RecoveryPhase,
}

impl RecoverySession {
    #[must_use]
    pub fn new(id: SessionId, shard: ShardId) -> Self {
        Self {
            id,
            shard,
            phase: RecoveryPhase::NotStarted,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    #[must_use]
    pub const fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    fn transition(&mut self, next: RecoveryPhase) {
        debug!(
            session_id=%self.id,
            shard=%self.shard,
            from=?self.phase,
            to=?next,
            "phase transition",
        );
        self.phase = next;
    }
}

/// Source-side orchestrator. Holds the collaborators one node needs to
/// recover any number of its shards, one session at a time each.
pub struct RecoverySource {
    transport: Arc<dyn RecoveryTransport>,
    store: Arc<dyn ContentStore>,
    tracker: Arc<dyn TransferTracker>,
    pool: TransferPool,
    config: RecoveryConfig,
}

impl Debug for RecoverySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverySource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RecoverySource {
    #[must_use]
    pub fn new(
        transport: Arc<dyn RecoveryTransport>,
        store: Arc<dyn ContentStore>,
        tracker: Arc<dyn TransferTracker>,
        pool: TransferPool,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            transport,
            store,
            tracker,
            pool,
            config,
        }
    }

    /// Drives `session` to completion against the target behind the
    /// transport. `shard` must be the handle of the shard the session was
    /// created for.
    pub async fn recover(
        &self,
        session: &mut RecoverySession,
        shard: &ShardHandle,
    ) -> Result<(), RecoveryError> {
        let started = Instant::now();
        debug!(session_id=%session.id, shard=%session.shard, "recovery: start");

        let result = self.run(session, shard).await;

        match &result {
            Ok(()) => {
                session.transition(RecoveryPhase::Done);
                debug!(
                    session_id=%session.id,
                    shard=%session.shard,
                    elapsed=?started.elapsed(),
                    "recovery: done",
                );
            }
            Err(err) => {
                session.transition(RecoveryPhase::Failed);
                error!(
                    session_id=%session.id,
                    shard=%session.shard,
                    error=%err,
                    "recovery: failed",
                );
            }
        }

        result
    }

    async fn run(
        &self,
        session: &mut RecoverySession,
        shard: &ShardHandle,
    ) -> Result<(), RecoveryError> {
        // give the target its chance to snapshot in-flight write state
        // before any digest sets are compared
        self.tracker.begin_session().await;
        self.tracker.snapshot_in_flight_transfers().await;

        let response = self
            .transport
            .request(RecoveryRequest::StartRecovery {
                session_id: session.id,
                shard: session.shard.clone(),
            })
            .await?;
        expect_ack(response)?;

        for bucket in Bucket::all() {
            session.transition(RecoveryPhase::Syncing { bucket });

            let diff = reconcile_bucket(
                &*self.transport,
                &*self.store,
                session.id,
                &session.shard,
                bucket,
            )
            .await?;

            push_all(
                &self.pool,
                Arc::clone(&self.transport),
                Arc::clone(&self.store),
                shard,
                session.id,
                &diff.local_only,
                self.config.chunk_size,
            )
            .await?;

            if !diff.remote_only.is_empty() {
                let response = self
                    .transport
                    .request(RecoveryRequest::DeleteFiles {
                        session_id: session.id,
                        digests: diff.remote_only.into_iter().collect(),
                    })
                    .await?;
                expect_ack(response)?;
            }
        }

        session.transition(RecoveryPhase::AwaitingRaceWindow);

        // bounded: give the target time to request the head bytes it is
        // missing for blobs whose ingestion raced the digest comparison
        self.tracker
            .wait_for_backfill_requests(self.config.get_head_timeout)
            .await;
        self.tracker.snapshot_active_backfills().await;

        // unbounded: the backfills being served are work the source has
        // already admitted
        self.tracker.wait_for_backfills_to_finish().await;

        session.transition(RecoveryPhase::Finalizing);

        let response = self
            .transport
            .request(RecoveryRequest::FinalizeRecovery {
                session_id: session.id,
            })
            .await?;
        expect_ack(response)?;

        self.tracker.end_session().await;

        Ok(())
    }
}
