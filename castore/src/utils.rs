//! Helpers to construct services and populate them.
//! Mostly used for testing purposes, but across crates.

use std::sync::Arc;

use prost::Message;

use crate::{
    blobservice::{BlobService, MemoryBlobService},
    digests::DigestFunction,
    Digest,
};

pub fn gen_blob_service() -> Arc<dyn BlobService> {
    Arc::new(MemoryBlobService::default())
}

/// Serializes a message, and uploads it to the passed [BlobService] using
/// SHA256. Returns the digest it got stored at.
pub async fn put_message<M: Message>(
    blob_service: &dyn BlobService,
    instance_name: &str,
    message: &M,
) -> std::io::Result<Digest> {
    let contents = message.encode_to_vec();
    let digest = Digest::new(
        instance_name,
        DigestFunction::Sha256.hash_hex(&contents),
        contents.len() as i64,
    )
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    blob_service.put(&digest, contents.into()).await?;
    Ok(digest)
}
