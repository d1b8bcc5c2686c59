use std::{io, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{path::Path, ObjectStore};
use tokio_util::io::StreamReader;
use tracing::{debug, instrument, Level};
use url::Url;

use super::{validate_contents, BlobReader, BlobService};
use crate::Digest;

/// Uses any object storage supported by the [object_store] crate to provide a
/// [BlobService].
///
/// # Data format
/// Blobs are stored verbatim at `${base_path}/$shard/$hash-$size`, where
/// `$shard` are the first two characters of the lower-hex hash.
/// The blob for "Hello World!" (SHA256) is stored at
/// `${base_path}/7f/7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069-12`.
///
/// Sharding reduces the number of files in the same directory, which would be a
/// problem at least when using [object_store::local::LocalFileSystem].
///
/// The instance name is not part of the path, so several instances can share
/// the same storage.
#[derive(Clone)]
pub struct ObjectStoreBlobService {
    object_store: Arc<dyn ObjectStore>,
    base_path: Path,
}

impl ObjectStoreBlobService {
    /// Constructs a new [ObjectStoreBlobService] from a [Url] supported by
    /// [object_store].
    /// Any path suffix becomes the base path of the object store.
    /// additional options, the same as in [object_store::parse_url_opts] can
    /// be passed.
    pub fn parse_url_opts<I, K, V>(url: &Url, options: I) -> Result<Self, object_store::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let (object_store, path) = object_store::parse_url_opts(url, options)?;

        Ok(Self {
            object_store: Arc::new(object_store),
            base_path: path,
        })
    }

    /// Like [Self::parse_url_opts], except without the options.
    pub fn parse_url(url: &Url) -> Result<Self, object_store::Error> {
        Self::parse_url_opts(url, Vec::<(String, String)>::new())
    }
}

#[instrument(level=Level::TRACE, skip_all, fields(base_path=%base_path, blob.digest=%digest), ret(Display))]
pub(crate) fn derive_blob_path(base_path: &Path, digest: &Digest) -> Path {
    base_path
        .child(&digest.hash()[..2])
        .child(digest.key().to_string())
}

pub(crate) fn into_io_error(e: object_store::Error) -> io::Error {
    match e {
        object_store::Error::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, e),
        e => io::Error::other(e),
    }
}

#[async_trait]
impl BlobService for ObjectStoreBlobService {
    #[instrument(skip_all, ret, err, fields(blob.digest=%digest))]
    async fn has(&self, digest: &Digest) -> io::Result<bool> {
        match self
            .object_store
            .head(&derive_blob_path(&self.base_path, digest))
            .await
        {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(into_io_error(e)),
        }
    }

    #[instrument(skip_all, err, fields(blob.digest=%digest))]
    async fn open_read(&self, digest: &Digest) -> io::Result<Option<Box<dyn BlobReader>>> {
        // The empty blob doesn't need to be stored.
        if digest.size_bytes() == 0 && digest.digest_contents(b"").key() == digest.key() {
            return Ok(Some(Box::new(io::Cursor::new(Bytes::new()))));
        }

        match self
            .object_store
            .get(&derive_blob_path(&self.base_path, digest))
            .await
        {
            Ok(res) => {
                debug!(size = res.meta.size, "opened blob");
                let stream = res.into_stream().map_err(into_io_error);
                Ok(Some(Box::new(StreamReader::new(stream))))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(into_io_error(e)),
        }
    }

    #[instrument(skip_all, err, fields(blob.digest=%digest))]
    async fn put(&self, digest: &Digest, contents: Bytes) -> io::Result<()> {
        validate_contents(digest, &contents)?;

        self.object_store
            .put(&derive_blob_path(&self.base_path, digest), contents.into())
            .await
            .map_err(into_io_error)?;

        Ok(())
    }
}
