//! Shard-level blob replication between two nodes.
//!
//! The source node holding an existing copy of a shard drives the protocol;
//! the target node converges to an identical set of blobs. One session walks
//! all digest buckets in a fixed order, pushing blobs the target is missing
//! and deleting blobs the source no longer holds, then waits out the window
//! in which concurrent writers may still force the target to backfill head
//! chunks before the session can be finalized.
//!
//! ```text
//! RecoverySource
//! ├── reconcile.rs  - per-bucket digest set difference
//! ├── transfer.rs   - chunked push of a single blob
//! ├── scheduler.rs  - bounded concurrent pushes, exact join
//! ├── session.rs    - the session state machine
//! ├── tracker.rs    - target-side in-flight-write bookkeeping seam
//! └── target.rs     - target-side session handler
//! ```

pub mod config;
pub mod error;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod shard;
pub mod target;
pub mod tracker;
pub mod transfer;
pub mod transport;
pub mod wire;

pub use config::RecoveryConfig;
pub use error::{RecoveryError, TransportError};
pub use reconcile::BucketDiff;
pub use scheduler::TransferPool;
pub use session::{RecoveryPhase, RecoverySession, RecoverySource};
pub use shard::ShardHandle;
pub use target::{RecoveryTarget, TargetError, TargetStore};
pub use tracker::{NoopTracker, TransferTracker};
pub use transport::RecoveryTransport;
pub use wire::{RecoveryRequest, RecoveryResponse, TransferId};
