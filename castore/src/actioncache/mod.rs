use async_trait::async_trait;

use crate::proto::ActionResult;
use crate::{Digest, Error};

mod from_addr;
mod memory;
mod object_store;


pub use self::from_addr::from_addr;
pub use self::memory::MemoryActionCache;
pub use self::object_store::ObjectStoreActionCache;

/// The maximum size of an encoded [ActionResult], if not configured
/// otherwise.
pub const DEFAULT_MAXIMUM_MESSAGE_SIZE_BYTES: usize = 16 * 1024 * 1024;

/// Stores the results of actions, by the digest of the action.
///
/// Unlike blobs in a [crate::blobservice::BlobService], entries are not
/// addressed by their own contents, so they can't be verified on read.
#[async_trait]
pub trait ActionCache: Send + Sync {
    /// Looks up the result of the action with the given digest.
    /// Returns Ok(None) if there's none.
    async fn get(&self, action_digest: &Digest) -> Result<Option<ActionResult>, Error>;

    /// Stores the result of the action with the given digest, replacing any
    /// previous one.
    async fn put(&self, action_digest: &Digest, action_result: &ActionResult)
        -> Result<(), Error>;
}

#[async_trait]
impl<A> ActionCache for A
where
    A: AsRef<dyn ActionCache> + Send + Sync,
{
    async fn get(&self, action_digest: &Digest) -> Result<Option<ActionResult>, Error> {
        self.as_ref().get(action_digest).await
    }

    async fn put(
        &self,
        action_digest: &Digest,
        action_result: &ActionResult,
    ) -> Result<(), Error> {
        self.as_ref().put(action_digest, action_result).await
    }
}

/// Refuses encoded messages larger than the configured maximum.
fn check_message_size(
    action_digest: &Digest,
    size: usize,
    maximum_message_size_bytes: usize,
) -> Result<(), Error> {
    if size > maximum_message_size_bytes {
        return Err(Error::Internal(format!(
            "action result for {} is {} bytes in size, while a maximum of {} bytes is permitted",
            action_digest, size, maximum_message_size_bytes
        )));
    }
    Ok(())
}
