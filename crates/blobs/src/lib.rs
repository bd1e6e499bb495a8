//! Local content-addressable blob storage.
//!
//! Blobs live under `<root>/<bucket>/<digest>` where `bucket` is the two
//! hex characters of the digest's leading byte. Recovery only ever reads
//! from this store; [`FileSystemStore::put`] exists for ingestion and for
//! seeding stores in tests.

use std::collections::HashSet;
use std::fmt::{self, Debug, Formatter};
use std::pin::Pin;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use coral_primitives::{Bucket, Digest};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncRead;
use tracing::trace;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob `{digest}` not found")]
    NotFound { digest: Digest },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An open blob: its byte stream, declared size, and path relative to the
/// store root.
pub struct BlobHandle {
    pub stream: Pin<Box<dyn AsyncRead + Send>>,
    pub size: u64,
    pub relative_path: Utf8PathBuf,
}

impl Debug for BlobHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobHandle")
            .field("size", &self.size)
            .field("relative_path", &self.relative_path)
            .finish_non_exhaustive()
    }
}

/// Capability the recovery core consumes: enumerate digests by bucket,
/// open a blob by digest.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn digests_in_bucket(&self, bucket: Bucket) -> Result<HashSet<Digest>, StoreError>;

    async fn open_blob(&self, digest: Digest) -> Result<BlobHandle, StoreError>;
}

#[derive(Clone, Debug)]
pub struct FileSystemStore {
    root: Utf8PathBuf,
}

impl FileSystemStore {
    pub async fn new(root: &Utf8Path) -> Result<Self, StoreError> {
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root: root.to_owned(),
        })
    }

    fn bucket_dir(&self, bucket: Bucket) -> Utf8PathBuf {
        self.root.join(bucket.to_string())
    }

    fn relative_path(digest: Digest) -> Utf8PathBuf {
        Utf8PathBuf::from(digest.bucket().to_string()).join(digest.to_string())
    }

    fn path(&self, digest: Digest) -> Utf8PathBuf {
        self.root.join(Self::relative_path(digest))
    }

    pub async fn put(&self, digest: Digest, data: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(self.bucket_dir(digest.bucket())).await?;
        fs::write(self.path(digest), data).await?;

        Ok(())
    }

    /// Removes a blob; deleting a blob that is already gone is not an error.
    pub async fn delete(&self, digest: Digest) -> Result<(), StoreError> {
        match fs::remove_file(self.path(digest)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ContentStore for FileSystemStore {
    async fn digests_in_bucket(&self, bucket: Bucket) -> Result<HashSet<Digest>, StoreError> {
        let mut digests = HashSet::new();

        let mut entries = match fs::read_dir(self.bucket_dir(bucket)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(digests),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();

            let Ok(digest) = name.to_string_lossy().parse::<Digest>() else {
                trace!(bucket=%bucket, name=?name, "skipping non-digest entry");
                continue;
            };

            let _ = digests.insert(digest);
        }

        Ok(digests)
    }

    async fn open_blob(&self, digest: Digest) -> Result<BlobHandle, StoreError> {
        let file = match fs::File::open(self.path(digest)).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { digest })
            }
            Err(err) => return Err(err.into()),
        };

        let size = file.metadata().await?.len();

        Ok(BlobHandle {
            stream: Box::pin(file),
            size,
            relative_path: Self::relative_path(digest),
        })
    }
}
