//! Shared identity types for the coral storage cluster.

pub mod digest;
pub mod session;
pub mod shard;

pub use digest::{Bucket, Digest, InvalidDigest};
pub use session::SessionId;
pub use shard::ShardId;
