//! Liveness handle for the shard being recovered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use coral_primitives::ShardId;

/// Shared view of whether the shard is still open. The transfer engine
/// polls this before every chunk send; closing is the only in-band abort
/// signal a running transfer observes.
#[derive(Clone, Debug)]
pub struct ShardHandle {
    id: ShardId,
    closed: Arc<AtomicBool>,
}

impl ShardHandle {
    #[must_use]
    pub fn new(id: ShardId) -> Self {
        Self {
            id,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ShardId {
        &self.id
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
