use url::Url;

use crate::Error;

use super::{BlobService, MemoryBlobService, ObjectStoreBlobService};

/// Constructs a new instance of a [BlobService] from an URI.
///
/// The following schemes are supported by the following services:
/// - `memory://` ([MemoryBlobService])
/// - `objectstore+*://` ([ObjectStoreBlobService])
///
/// For object stores, the URL with the `objectstore+` prefix stripped is
/// passed to [ObjectStoreBlobService::parse_url], see there for the syntax.
pub async fn from_addr(uri: &str) -> Result<Box<dyn BlobService>, Error> {
    let url =
        Url::parse(uri).map_err(|e| Error::Internal(format!("unable to parse url: {}", e)))?;

    let blob_service: Box<dyn BlobService> = match url.scheme() {
        "memory" => {
            // memory doesn't support host or path in the URL.
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::Internal("invalid url".to_string()));
            }
            Box::<MemoryBlobService>::default()
        }
        scheme if scheme.starts_with("objectstore+") => {
            // We need to convert the URL to string, strip the prefix there, and then
            // parse it back as url, as Url::set_scheme() rejects some of the transitions we want to do.
            let trimmed_url = url
                .as_str()
                .strip_prefix("objectstore+")
                .map(Url::parse)
                .transpose()
                .map_err(|e| Error::Internal(format!("unable to parse url: {}", e)))?
                .ok_or_else(|| Error::Internal("invalid url".to_string()))?;

            Box::new(
                ObjectStoreBlobService::parse_url(&trimmed_url)
                    .map_err(|e| Error::Internal(e.to_string()))?,
            )
        }
        scheme => return Err(Error::Internal(format!("unknown scheme: {}", scheme))),
    };

    Ok(blob_service)
}
