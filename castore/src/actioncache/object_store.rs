use std::sync::Arc;

use async_trait::async_trait;
use object_store::{path::Path, ObjectStore};
use prost::Message;
use tracing::{debug, instrument};
use url::Url;

use super::{check_message_size, ActionCache};
use crate::blobservice::{derive_blob_path, into_io_error};
use crate::proto::ActionResult;
use crate::{Digest, Error};

/// Uses any object storage supported by the [object_store] crate to provide
/// an [ActionCache].
///
/// Encoded action results are stored at `${base_path}/$shard/$hash-$size`,
/// the same layout [crate::blobservice::ObjectStoreBlobService] uses, with
/// the hash and size of the action digest.
#[derive(Clone)]
pub struct ObjectStoreActionCache {
    object_store: Arc<dyn ObjectStore>,
    base_path: Path,
    maximum_message_size_bytes: usize,
}

impl ObjectStoreActionCache {
    /// Constructs a new [ObjectStoreActionCache] from a [Url] supported by
    /// [object_store]. Any path suffix becomes the base path of the object
    /// store.
    pub fn parse_url(
        url: &Url,
        maximum_message_size_bytes: usize,
    ) -> Result<Self, object_store::Error> {
        let (object_store, path) = object_store::parse_url(url)?;

        Ok(Self {
            object_store: Arc::new(object_store),
            base_path: path,
            maximum_message_size_bytes,
        })
    }
}

#[async_trait]
impl ActionCache for ObjectStoreActionCache {
    #[instrument(skip_all, err, fields(action.digest=%action_digest))]
    async fn get(&self, action_digest: &Digest) -> Result<Option<ActionResult>, Error> {
        let res = match self
            .object_store
            .get(&derive_blob_path(&self.base_path, action_digest))
            .await
        {
            Ok(res) => res,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(into_io_error(e).into()),
        };

        debug!(size = res.meta.size, "found action result");
        check_message_size(action_digest, res.meta.size, self.maximum_message_size_bytes)?;

        let encoded = res.bytes().await.map_err(into_io_error)?;
        Ok(Some(ActionResult::decode(encoded)?))
    }

    #[instrument(skip_all, err, fields(action.digest=%action_digest))]
    async fn put(
        &self,
        action_digest: &Digest,
        action_result: &ActionResult,
    ) -> Result<(), Error> {
        let encoded = action_result.encode_to_vec();
        check_message_size(action_digest, encoded.len(), self.maximum_message_size_bytes)?;

        self.object_store
            .put(
                &derive_blob_path(&self.base_path, action_digest),
                bytes::Bytes::from(encoded).into(),
            )
            .await
            .map_err(into_io_error)?;

        Ok(())
    }
}
