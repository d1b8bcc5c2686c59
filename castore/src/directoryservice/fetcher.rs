use async_trait::async_trait;
use tracing::{debug, instrument};

use super::DirectoryService;
use crate::proto::Directory;
use crate::{Digest, Error};

/// Resolves child directories while walking a directory graph.
///
/// Unlike [DirectoryService], a missing directory is an error here, as the
/// caller only asks for directories referenced from a parent.
/// Implementations decide which kind: an absent directory in a backend is
/// [Error::NotFound], while a tree bundle lacking one of its own descendants
/// is [Error::InconsistentBundle].
#[async_trait]
pub trait DirectoryFetcher: Send + Sync {
    async fn fetch(&self, digest: &Digest) -> Result<Directory, Error>;
}

#[async_trait]
impl<A> DirectoryFetcher for A
where
    A: AsRef<dyn DirectoryFetcher> + Send + Sync,
{
    async fn fetch(&self, digest: &Digest) -> Result<Directory, Error> {
        self.as_ref().fetch(digest).await
    }
}

/// Fetches every directory from a [DirectoryService], one round trip per
/// directory. Nothing is cached between calls.
#[derive(Clone)]
pub struct RemoteFetcher<DS> {
    directory_service: DS,
}

impl<DS> RemoteFetcher<DS> {
    pub fn new(directory_service: DS) -> Self {
        Self { directory_service }
    }
}

#[async_trait]
impl<DS> DirectoryFetcher for RemoteFetcher<DS>
where
    DS: DirectoryService,
{
    #[instrument(skip(self, digest), fields(directory.digest = %digest), err)]
    async fn fetch(&self, digest: &Digest) -> Result<Directory, Error> {
        debug!("fetching directory");
        self.directory_service
            .get(digest)
            .await?
            .ok_or_else(|| Error::NotFound(digest.clone()))
    }
}
