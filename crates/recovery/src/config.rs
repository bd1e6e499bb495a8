//! Recovery configuration with sensible defaults.

use tokio::time;

/// Default read buffer for chunked transfers (16 KiB). An implementation
/// constant, not part of the wire protocol.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 4096;

/// Default timeout for a single request round trip (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default bounded wait for the target to report head-chunk backfill
/// requests after all buckets are synced (30 seconds).
pub const DEFAULT_GET_HEAD_TIMEOUT_SECS: u64 = 30;

/// Default size of the shared transfer worker pool.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 4;

/// Tuning knobs for one recovery source.
#[derive(Copy, Clone, Debug)]
pub struct RecoveryConfig {
    /// Read buffer size for chunked transfers.
    pub chunk_size: usize,

    /// Timeout budget transports should apply per round trip.
    pub request_timeout: time::Duration,

    /// Bounded wait for the race-window signal before finalizing.
    pub get_head_timeout: time::Duration,

    /// Concurrent pushes per bucket (shared pool size).
    pub max_concurrent_transfers: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: time::Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            get_head_timeout: time::Duration::from_secs(DEFAULT_GET_HEAD_TIMEOUT_SECS),
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
        }
    }
}
