use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::io::{self, Cursor};
use std::{collections::HashMap, sync::Arc};
use tracing::instrument;

use super::{validate_contents, BlobReader, BlobService};
use crate::{Digest, DigestKey};

#[derive(Clone, Default)]
pub struct MemoryBlobService {
    db: Arc<RwLock<HashMap<DigestKey, Bytes>>>,
}

#[async_trait]
impl BlobService for MemoryBlobService {
    #[instrument(skip(self, digest), fields(blob.digest=%digest))]
    async fn has(&self, digest: &Digest) -> io::Result<bool> {
        let db = self.db.read();
        Ok(db.contains_key(&digest.key()))
    }

    #[instrument(skip(self, digest), fields(blob.digest=%digest))]
    async fn open_read(&self, digest: &Digest) -> io::Result<Option<Box<dyn BlobReader>>> {
        let db = self.db.read();

        Ok(db
            .get(&digest.key())
            .map(|contents| Box::new(Cursor::new(contents.clone())) as Box<dyn BlobReader>))
    }

    #[instrument(skip(self, digest, contents), fields(blob.digest=%digest))]
    async fn put(&self, digest: &Digest, contents: Bytes) -> io::Result<()> {
        validate_contents(digest, &contents)?;

        self.db.write().insert(digest.key(), contents);
        Ok(())
    }
}
