use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use prost::Message;
use tracing::instrument;

use super::{check_message_size, ActionCache, DEFAULT_MAXIMUM_MESSAGE_SIZE_BYTES};
use crate::proto::ActionResult;
use crate::{Digest, DigestKey, Error};

/// Keeps encoded action results in memory.
#[derive(Clone)]
pub struct MemoryActionCache {
    db: Arc<RwLock<HashMap<DigestKey, Bytes>>>,
    maximum_message_size_bytes: usize,
}

impl MemoryActionCache {
    pub fn new(maximum_message_size_bytes: usize) -> Self {
        Self {
            db: Default::default(),
            maximum_message_size_bytes,
        }
    }
}

impl Default for MemoryActionCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAXIMUM_MESSAGE_SIZE_BYTES)
    }
}

#[async_trait]
impl ActionCache for MemoryActionCache {
    #[instrument(skip(self, action_digest), fields(action.digest=%action_digest))]
    async fn get(&self, action_digest: &Digest) -> Result<Option<ActionResult>, Error> {
        let encoded = match self.db.read().get(&action_digest.key()) {
            Some(encoded) => encoded.clone(),
            None => return Ok(None),
        };

        check_message_size(action_digest, encoded.len(), self.maximum_message_size_bytes)?;
        Ok(Some(ActionResult::decode(encoded)?))
    }

    #[instrument(skip(self, action_digest, action_result), fields(action.digest=%action_digest))]
    async fn put(
        &self,
        action_digest: &Digest,
        action_result: &ActionResult,
    ) -> Result<(), Error> {
        let encoded = action_result.encode_to_vec();
        check_message_size(action_digest, encoded.len(), self.maximum_message_size_bytes)?;

        self.db.write().insert(action_digest.key(), encoded.into());
        Ok(())
    }
}
