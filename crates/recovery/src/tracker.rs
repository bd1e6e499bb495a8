//! Seam to the target's in-flight-write bookkeeping.
//!
//! While a session runs, the target keeps receiving replicated writes for
//! newly ingested blobs outside this protocol. When a replicated chunk
//! arrives before the blob's initial bytes were ever observed locally, the
//! target requests the missing head bytes from the source out-of-band. The
//! orchestrator consumes this trait to hold finalization until no such
//! backfill is still outstanding; it never owns the bookkeeping itself.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait TransferTracker: Send + Sync {
    /// Session is starting; snapshot-related state may be initialized.
    async fn begin_session(&self);

    /// Capture the transfers already in flight when the session starts.
    async fn snapshot_in_flight_transfers(&self);

    /// Bounded wait for the target to get its head-chunk requests in.
    /// Returning after the timeout with none reported is the normal case.
    async fn wait_for_backfill_requests(&self, timeout: Duration);

    /// Capture the backfills the source is actively serving.
    async fn snapshot_active_backfills(&self);

    /// Unbounded wait: these backfills are already-admitted work, so the
    /// session must see them through no matter how long they take. Under
    /// sustained write load this can stall finalization indefinitely; an
    /// accepted liveness risk.
    async fn wait_for_backfills_to_finish(&self);

    /// Session is over; bookkeeping may be torn down.
    async fn end_session(&self);
}

/// Tracker for targets without concurrent ingestion: nothing to wait for.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTracker;

#[async_trait]
impl TransferTracker for NoopTracker {
    async fn begin_session(&self) {}

    async fn snapshot_in_flight_transfers(&self) {}

    async fn wait_for_backfill_requests(&self, _timeout: Duration) {}

    async fn snapshot_active_backfills(&self) {}

    async fn wait_for_backfills_to_finish(&self) {}

    async fn end_session(&self) {}
}
