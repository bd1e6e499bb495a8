//! Per-bucket digest set reconciliation.

use std::collections::HashSet;

use coral_blobs::ContentStore;
use coral_primitives::{Bucket, Digest, SessionId, ShardId};
use tracing::debug;

use crate::error::RecoveryError;
use crate::transport::{expect_digest_set, RecoveryTransport};
use crate::wire::RecoveryRequest;

/// Symmetric difference between the two nodes' digest sets for one bucket.
#[derive(Clone, Debug, Default)]
pub struct BucketDiff {
    /// Present at the source, absent at the target: must be pushed.
    pub local_only: HashSet<Digest>,
    /// Present at the target, absent at the source: must be deleted.
    pub remote_only: HashSet<Digest>,
}

/// Set difference both ways. Digest equality is byte-exact.
#[must_use]
pub fn diff(local: &HashSet<Digest>, remote: &HashSet<Digest>) -> BucketDiff {
    BucketDiff {
        local_only: local.difference(remote).copied().collect(),
        remote_only: remote.difference(local).copied().collect(),
    }
}

/// Fetches both sides' digest sets for `bucket` and computes the diff.
///
/// A transport failure here aborts the whole session; a bucket cannot be
/// partially reconciled.
pub async fn reconcile_bucket(
    transport: &dyn RecoveryTransport,
    store: &dyn ContentStore,
    session_id: SessionId,
    shard: &ShardId,
    bucket: Bucket,
) -> Result<BucketDiff, RecoveryError> {
    let response = transport
        .request(RecoveryRequest::StartPrefixSync {
            session_id,
            shard: shard.clone(),
            bucket,
        })
        .await?;

    let remote: HashSet<Digest> = expect_digest_set(response)?.into_iter().collect();
    let local = store.digests_in_bucket(bucket).await?;

    let diff = diff(&local, &remote);

    debug!(
        session_id=%session_id,
        shard=%shard,
        bucket=%bucket,
        local=local.len(),
        remote=remote.len(),
        to_push=diff.local_only.len(),
        to_delete=diff.remote_only.len(),
        "bucket reconciled",
    );

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digests(labels: &[&str]) -> HashSet<Digest> {
        labels.iter().map(|l| Digest::hash(l.as_bytes())).collect()
    }

    #[test]
    fn diff_is_set_difference_both_ways() {
        let local = digests(&["a", "b", "c"]);
        let remote = digests(&["b", "d"]);

        let diff = diff(&local, &remote);

        assert_eq!(diff.local_only, digests(&["a", "c"]), "push set is L - R");
        assert_eq!(diff.remote_only, digests(&["d"]), "delete set is R - L");
    }

    #[test]
    fn diff_sides_are_disjoint() {
        let local = digests(&["a", "b", "c", "e"]);
        let remote = digests(&["b", "c", "d", "f"]);

        let diff = diff(&local, &remote);

        assert!(
            diff.local_only.is_disjoint(&diff.remote_only),
            "a digest cannot need both push and delete"
        );
    }

    #[test]
    fn identical_sets_diff_to_nothing() {
        let both = digests(&["a", "b"]);

        let diff = diff(&both, &both);

        assert!(diff.local_only.is_empty());
        assert!(diff.remote_only.is_empty());
    }

    #[test]
    fn empty_remote_pushes_everything() {
        let local = digests(&["a", "b"]);

        let diff = diff(&local, &HashSet::new());

        assert_eq!(diff.local_only, local);
        assert!(diff.remote_only.is_empty());
    }
}
