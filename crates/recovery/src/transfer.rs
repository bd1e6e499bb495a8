//! Chunked transfer of a single blob to the target.
//!
//! The first read goes out as a `StartTransfer` carrying the destination
//! path and declared size; the target answers with the transfer id every
//! follow-up chunk must be tagged with. The chunk whose cumulative bytes
//! reach the declared size carries the last-chunk flag. If the stream runs
//! dry without the flag ever being set, one synthetic empty chunk closes
//! the transfer so the target observes exactly one final chunk.

use std::borrow::Cow;

use coral_blobs::ContentStore;
use coral_primitives::{Digest, SessionId};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{error, trace, warn};

use crate::error::RecoveryError;
use crate::shard::ShardHandle;
use crate::transport::{expect_ack, expect_transfer_started, RecoveryTransport};
use crate::wire::{RecoveryRequest, TransferId};

/// Bookkeeping for one in-flight file, owned by the worker pushing it.
#[derive(Debug)]
struct TransferRecord {
    transfer_id: TransferId,
    relative_path: String,
    total_size: u64,
    bytes_sent: u64,
    last_marked: bool,
}

/// Pushes the blob identified by `digest` to the target.
///
/// A zero-length blob sends no messages at all; the target never learns the
/// digest exists. That matches the behavior replicated targets depend on,
/// questionable as it is.
pub async fn push_blob(
    transport: &dyn RecoveryTransport,
    store: &dyn ContentStore,
    shard: &ShardHandle,
    session_id: SessionId,
    digest: Digest,
    chunk_size: usize,
) -> Result<(), RecoveryError> {
    let mut blob = store.open_blob(digest).await?;
    let relative_path = blob.relative_path.into_string();

    let mut buf = vec![0; chunk_size];

    let bytes_read = fill(&mut blob.stream, &mut buf)
        .await
        .map_err(|source| RecoveryError::BlobRead { digest, source })?;

    if bytes_read == 0 {
        warn!(
            session_id=%session_id,
            shard=%shard.id(),
            digest=%digest,
            "empty blob, skipping transfer",
        );
        return Ok(());
    }

    trace!(
        session_id=%session_id,
        shard=%shard.id(),
        path=%relative_path,
        size=blob.size,
        "starting transfer",
    );

    let response = transport
        .request(RecoveryRequest::StartTransfer {
            session_id,
            relative_path: relative_path.clone(),
            payload: Cow::Borrowed(&buf[..bytes_read]),
            total_size: blob.size,
        })
        .await?;

    let mut record = TransferRecord {
        transfer_id: expect_transfer_started(response)?,
        relative_path,
        total_size: blob.size,
        bytes_sent: bytes_read as u64,
        last_marked: false,
    };

    loop {
        let bytes_read = fill(&mut blob.stream, &mut buf)
            .await
            .map_err(|source| RecoveryError::BlobRead { digest, source })?;

        if bytes_read == 0 {
            break;
        }

        // the shard may get closed on us mid-transfer
        if shard.is_closed() {
            return Err(RecoveryError::ShardClosed {
                shard: shard.id().clone(),
            });
        }

        record.bytes_sent += bytes_read as u64;
        let last = record.bytes_sent == record.total_size;

        let response = transport
            .request(RecoveryRequest::TransferChunk {
                session_id,
                transfer_id: record.transfer_id,
                payload: Cow::Borrowed(&buf[..bytes_read]),
                last,
            })
            .await?;
        expect_ack(response)?;

        if last {
            record.last_marked = true;
        }
    }

    if !record.last_marked {
        error!(
            session_id=%session_id,
            path=%record.relative_path,
            bytes_sent=record.bytes_sent,
            total_size=record.total_size,
            "last chunk flag never sent, closing transfer with an empty chunk",
        );

        let response = transport
            .request(RecoveryRequest::TransferChunk {
                session_id,
                transfer_id: record.transfer_id,
                payload: Cow::Borrowed(&[]),
                last: true,
            })
            .await?;
        expect_ack(response)?;
    }

    trace!(
        session_id=%session_id,
        shard=%shard.id(),
        path=%record.relative_path,
        "transfer complete",
    );

    Ok(())
}

/// Reads until `buf` is full or the stream is exhausted, so chunk sizes
/// stay deterministic regardless of how the reader fragments its reads.
async fn fill<R>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;

    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;

    /// Yields its content in fixed fragments smaller than the chunk size.
    struct FragmentedReader {
        content: Vec<u8>,
        offset: usize,
        fragment: usize,
    }

    impl AsyncRead for FragmentedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let remaining = self.content.len() - self.offset;
            let n = remaining.min(self.fragment).min(buf.remaining());
            let offset = self.offset;
            buf.put_slice(&self.content[offset..offset + n]);
            self.offset += n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn fill_coalesces_short_reads() {
        let mut reader = FragmentedReader {
            content: vec![7; 1000],
            offset: 0,
            fragment: 64,
        };

        let mut buf = [0; 512];
        let n = fill(&mut reader, &mut buf).await.expect("read");
        assert_eq!(n, 512, "buffer filled despite 64-byte fragments");

        let n = fill(&mut reader, &mut buf).await.expect("read");
        assert_eq!(n, 488, "trailing partial buffer at end of stream");

        let n = fill(&mut reader, &mut buf).await.expect("read");
        assert_eq!(n, 0, "exhausted stream reads zero");
    }
}
