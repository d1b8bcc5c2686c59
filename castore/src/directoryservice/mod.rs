use async_trait::async_trait;

use crate::proto::Directory;
use crate::{Digest, Error};

mod blob;
mod fetcher;
mod utils;


pub use self::blob::BlobDirectoryService;
pub use self::fetcher::{DirectoryFetcher, RemoteFetcher};
pub use self::utils::read_message;

/// The base trait all Directory services need to implement.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Looks up a single Directory message by its digest.
    /// In case the directory is not found, Ok(None) is returned.
    /// Directories that can be found but fail to decode, or don't match the
    /// digest they were requested with, are errors.
    async fn get(&self, digest: &Digest) -> Result<Option<Directory>, Error>;
}

#[async_trait]
impl<A> DirectoryService for A
where
    A: AsRef<dyn DirectoryService> + Send + Sync,
{
    async fn get(&self, digest: &Digest) -> Result<Option<Directory>, Error> {
        self.as_ref().get(digest).await
    }
}
