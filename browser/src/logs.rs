//! Resolves the standard output and error logs of action results, which are
//! either inlined into the action result or stored in the CAS.
use casbrowser_castore::blobservice::BlobService;
use casbrowser_castore::{proto, Digest, Error};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Logs larger than this are not shown.
pub const MAXIMUM_LOG_SIZE_BYTES: i64 = 100_000;

#[derive(Debug, PartialEq, Serialize)]
pub struct LogInfo {
    pub name: String,
    /// Where the log is stored in the CAS, if it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(flatten)]
    pub contents: LogContents,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum LogContents {
    /// The log text. Invalid UTF-8 is replaced.
    Available(String),
    /// The log exceeds [MAXIMUM_LOG_SIZE_BYTES], and wasn't fetched.
    TooLarge,
    /// The action result refers to a log the CAS doesn't have.
    NotFound,
}

/// Resolves a log of an action result, given its inline contents and
/// digest. Returns Ok(None) if there's no log.
pub async fn log_info_from_action_result<BS>(
    blob_service: &BS,
    name: &str,
    instance_name: &str,
    log_digest: Option<&proto::Digest>,
    raw_log: &[u8],
) -> Result<Option<LogInfo>, Error>
where
    BS: BlobService + ?Sized,
{
    let digest = log_digest
        .map(|partial| Digest::from_partial(instance_name, Some(partial)))
        .transpose()?;

    if !raw_log.is_empty() {
        return Ok(Some(LogInfo {
            name: name.to_string(),
            digest: digest.map(|digest| digest.key().to_string()),
            contents: LogContents::Available(String::from_utf8_lossy(raw_log).into_owned()),
        }));
    }

    match digest {
        Some(digest) => log_info_for_digest(blob_service, name, &digest).await,
        None => Ok(None),
    }
}

/// Loads a log from the CAS. Empty logs are treated as absent, without
/// accessing the CAS at all.
#[instrument(skip(blob_service, digest), fields(log.digest=%digest), err)]
pub async fn log_info_for_digest<BS>(
    blob_service: &BS,
    name: &str,
    digest: &Digest,
) -> Result<Option<LogInfo>, Error>
where
    BS: BlobService + ?Sized,
{
    let size = digest.size_bytes();
    if size == 0 {
        return Ok(None);
    }

    let log_info = |contents| {
        Some(LogInfo {
            name: name.to_string(),
            digest: Some(digest.key().to_string()),
            contents,
        })
    };

    if size > MAXIMUM_LOG_SIZE_BYTES {
        debug!(size, "log too large");
        return Ok(log_info(LogContents::TooLarge));
    }

    let reader = match blob_service.open_read(digest).await? {
        Some(reader) => reader,
        None => return Ok(log_info(LogContents::NotFound)),
    };

    let mut data = Vec::with_capacity(size as usize);
    reader
        .take(MAXIMUM_LOG_SIZE_BYTES as u64)
        .read_to_end(&mut data)
        .await?;

    Ok(log_info(LogContents::Available(
        String::from_utf8_lossy(&data).into_owned(),
    )))
}
