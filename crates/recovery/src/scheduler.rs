//! Bounded, exactly-joined scheduling of per-bucket blob pushes.
//!
//! Pushes within a bucket run concurrently on a shared worker pool. The
//! join is unconditional: the scheduler only returns once every scheduled
//! push has terminated, even when one of them failed early. The first
//! failure is kept and surfaced after the join; later failures are logged
//! and dropped, since the session aborts either way.

use std::collections::HashSet;
use std::sync::Arc;

use coral_blobs::ContentStore;
use coral_primitives::{Digest, SessionId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{trace, warn};

use crate::error::{RecoveryError, TransportError};
use crate::shard::ShardHandle;
use crate::transfer::push_blob;
use crate::transport::RecoveryTransport;

/// Shared, size-bounded worker pool. Sessions submit and join work here;
/// they never own the pool's lifecycle.
#[derive(Clone, Debug)]
pub struct TransferPool {
    permits: Arc<Semaphore>,
}

impl TransferPool {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers)),
        }
    }
}

/// Pushes every digest in `digests` concurrently and reports the first
/// failure once all pushes have terminated.
pub async fn push_all(
    pool: &TransferPool,
    transport: Arc<dyn RecoveryTransport>,
    store: Arc<dyn ContentStore>,
    shard: &ShardHandle,
    session_id: SessionId,
    digests: &HashSet<Digest>,
    chunk_size: usize,
) -> Result<(), RecoveryError> {
    let mut workers = JoinSet::new();

    for &digest in digests {
        let permits = Arc::clone(&pool.permits);
        let transport = Arc::clone(&transport);
        let store = Arc::clone(&store);
        let shard = shard.clone();

        let _handle = workers.spawn(async move {
            let permit = permits
                .acquire_owned()
                .await
                // the pool is shared and never closed while sessions run
                .map_err(|_closed| TransportError::Closed);

            let result = match permit {
                Ok(_permit) => {
                    push_blob(&*transport, &*store, &shard, session_id, digest, chunk_size).await
                }
                Err(err) => Err(err.into()),
            };

            (digest, result)
        });
    }

    let scheduled = digests.len();
    let mut completed = 0_usize;
    let mut first_failure = None;

    while let Some(joined) = workers.join_next().await {
        completed += 1;

        let failure = match joined {
            Ok((_, Ok(()))) => continue,
            Ok((digest, Err(err))) => {
                warn!(
                    session_id=%session_id,
                    shard=%shard.id(),
                    digest=%digest,
                    error=%err,
                    "blob push failed",
                );
                err
            }
            Err(join_err) => RecoveryError::WorkerLost(join_err),
        };

        if first_failure.is_none() {
            first_failure = Some(failure);
        }
    }

    trace!(
        session_id=%session_id,
        shard=%shard.id(),
        scheduled,
        completed,
        "bucket pushes joined",
    );

    first_failure.map_or(Ok(()), Err)
}
