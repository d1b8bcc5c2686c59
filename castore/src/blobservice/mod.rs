use async_trait::async_trait;
use std::io;

use crate::Digest;

mod from_addr;
mod memory;
mod object_store;


pub use self::from_addr::from_addr;
pub use self::memory::MemoryBlobService;
pub use self::object_store::ObjectStoreBlobService;

pub(crate) use self::object_store::{derive_blob_path, into_io_error};

/// The base trait all BlobService services need to implement.
/// It provides functions to check whether a given blob exists, a way to
/// stream a blob, and a way to upload one.
///
/// Blobs are content addressed, implementations may ignore the instance name
/// of the digests passed in.
#[async_trait]
pub trait BlobService: Send + Sync {
    /// Check if the service has the blob, by its digest.
    async fn has(&self, digest: &Digest) -> io::Result<bool>;

    /// Request a blob from the store, by its digest.
    /// Returns Ok(None) if the blob doesn't exist.
    ///
    /// Callers wanting to only read a prefix of the blob can wrap the reader
    /// in [tokio::io::AsyncReadExt::take].
    async fn open_read(&self, digest: &Digest) -> io::Result<Option<Box<dyn BlobReader>>>;

    /// Insert a blob into the store.
    /// An error of kind [io::ErrorKind::InvalidInput] is returned if the
    /// contents don't match the digest.
    async fn put(&self, digest: &Digest, contents: bytes::Bytes) -> io::Result<()>;
}

#[async_trait]
impl<A> BlobService for A
where
    A: AsRef<dyn BlobService> + Send + Sync,
{
    async fn has(&self, digest: &Digest) -> io::Result<bool> {
        self.as_ref().has(digest).await
    }

    async fn open_read(&self, digest: &Digest) -> io::Result<Option<Box<dyn BlobReader>>> {
        self.as_ref().open_read(digest).await
    }

    async fn put(&self, digest: &Digest, contents: bytes::Bytes) -> io::Result<()> {
        self.as_ref().put(digest, contents).await
    }
}

/// BlobReader is a [tokio::io::AsyncRead] that can be sent across tasks.
pub trait BlobReader: tokio::io::AsyncRead + Send + Unpin + 'static {}

impl<R> BlobReader for R where R: tokio::io::AsyncRead + Send + Unpin + 'static {}

/// Ensures the passed contents match the digest, before they get stored.
fn validate_contents(digest: &Digest, contents: &[u8]) -> io::Result<()> {
    let actual = digest.digest_contents(contents);
    if actual.key() != digest.key() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("contents have digest {}, expected {}", actual, digest),
        ));
    }
    Ok(())
}
