use async_trait::async_trait;
use tracing::instrument;

use super::{read_message, DirectoryService};
use crate::blobservice::BlobService;
use crate::proto::Directory;
use crate::{Digest, Error};

/// Serves [Directory] messages stored as regular blobs in a content
/// addressable [BlobService].
///
/// Every call is a separate round trip to the backend, there's no caching.
#[derive(Clone)]
pub struct BlobDirectoryService<BS> {
    blob_service: BS,
}

impl<BS> BlobDirectoryService<BS> {
    pub fn new(blob_service: BS) -> Self {
        Self { blob_service }
    }
}

#[async_trait]
impl<BS> DirectoryService for BlobDirectoryService<BS>
where
    BS: BlobService,
{
    #[instrument(skip(self, digest), fields(directory.digest = %digest))]
    async fn get(&self, digest: &Digest) -> Result<Option<Directory>, Error> {
        read_message(&self.blob_service, digest, None).await
    }
}
