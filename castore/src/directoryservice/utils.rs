use prost::Message;
use tokio::io::AsyncReadExt;
use tracing::{instrument, warn};

use crate::blobservice::BlobService;
use crate::{Digest, Error};

/// Reads the blob with the given digest from a [BlobService], and decodes it
/// as a protobuf message.
///
/// The blob must have exactly the size and hash the digest declares, to
/// detect corruptions. If a maximum size is passed, larger blobs are refused
/// before they're fetched.
///
/// Returns Ok(None) if the blob doesn't exist.
#[instrument(skip(blob_service), fields(blob.digest=%digest), err)]
pub async fn read_message<M, BS>(
    blob_service: &BS,
    digest: &Digest,
    maximum_size_bytes: Option<usize>,
) -> Result<Option<M>, Error>
where
    M: Message + Default,
    BS: BlobService + ?Sized,
{
    let size = digest.size_bytes() as u64;
    if let Some(maximum_size_bytes) = maximum_size_bytes {
        if size > maximum_size_bytes as u64 {
            return Err(Error::Internal(format!(
                "{} is {} bytes in size, while a maximum of {} bytes is permitted",
                digest, size, maximum_size_bytes
            )));
        }
    }

    let reader = match blob_service.open_read(digest).await? {
        Some(reader) => reader,
        None => return Ok(None),
    };

    // read one more byte than expected, so we notice blobs that are too long.
    let mut buf = Vec::with_capacity(size.min(64 * 1024) as usize);
    reader.take(size + 1).read_to_end(&mut buf).await?;

    let actual = digest.digest_contents(&buf);
    if actual.key() != digest.key() {
        warn!(actual=%actual, "blob contents don't match digest");
        return Err(Error::Internal(format!(
            "requested {}, but got {}",
            digest, actual
        )));
    }

    Ok(Some(M::decode(buf.as_slice())?))
}
