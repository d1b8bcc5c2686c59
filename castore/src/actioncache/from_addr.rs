use url::Url;

use super::{ActionCache, MemoryActionCache, ObjectStoreActionCache};
use crate::Error;

/// Constructs a new instance of an [ActionCache] from an URI.
///
/// The same schemes as for [crate::blobservice::from_addr] are supported:
/// - `memory://` ([MemoryActionCache])
/// - `objectstore+*://` ([ObjectStoreActionCache])
///
/// Action results larger than `maximum_message_size_bytes` are refused.
pub async fn from_addr(
    uri: &str,
    maximum_message_size_bytes: usize,
) -> Result<Box<dyn ActionCache>, Error> {
    let url =
        Url::parse(uri).map_err(|e| Error::Internal(format!("unable to parse url: {}", e)))?;

    let action_cache: Box<dyn ActionCache> = match url.scheme() {
        "memory" => {
            if url.has_host() || !url.path().is_empty() {
                return Err(Error::Internal("invalid url".to_string()));
            }
            Box::new(MemoryActionCache::new(maximum_message_size_bytes))
        }
        scheme if scheme.starts_with("objectstore+") => {
            let trimmed_url = url
                .as_str()
                .strip_prefix("objectstore+")
                .map(Url::parse)
                .transpose()
                .map_err(|e| Error::Internal(format!("unable to parse url: {}", e)))?
                .ok_or_else(|| Error::Internal("invalid url".to_string()))?;

            Box::new(
                ObjectStoreActionCache::parse_url(&trimmed_url, maximum_message_size_bytes)
                    .map_err(|e| Error::Internal(e.to_string()))?,
            )
        }
        scheme => return Err(Error::Internal(format!("unknown scheme: {}", scheme))),
    };

    Ok(action_cache)
}
