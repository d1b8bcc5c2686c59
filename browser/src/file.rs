use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use casbrowser_castore::blobservice::BlobService;
use casbrowser_castore::Error;
use futures::{stream, StreamExt};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use crate::errors::reject;
use crate::params::FileParams;
use crate::AppState;

/// How much of a file is read before responding, to detect errors and
/// guess the content type.
const FIRST_CHUNK_SIZE: u64 = 4096;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Guesses the content type from the first bytes of a file.
/// A multi-byte character cut off at the end of the chunk still counts as
/// text.
fn sniff_content_type(first_chunk: &[u8]) -> &'static str {
    match std::str::from_utf8(first_chunk) {
        Ok(_) => TEXT_CONTENT_TYPE,
        Err(e) if e.error_len().is_none() => TEXT_CONTENT_TYPE,
        Err(_) => BINARY_CONTENT_TYPE,
    }
}

#[instrument(skip(blob_service))]
pub async fn get(
    Path(params): Path<FileParams>,
    State(AppState { blob_service, .. }): State<AppState>,
) -> Result<Response, StatusCode> {
    let digest = params.digest()?;

    let mut reader = blob_service
        .open_read(&digest)
        .await
        .map_err(|e| reject(e.into()))?
        .ok_or_else(|| reject(Error::NotFound(digest.clone())))?;

    // read the first chunk before sending any headers, so errors can still
    // be reported with a proper status code.
    let mut first_chunk = Vec::with_capacity(FIRST_CHUNK_SIZE as usize);
    (&mut reader)
        .take(FIRST_CHUNK_SIZE)
        .read_to_end(&mut first_chunk)
        .await
        .map_err(|e| reject(e.into()))?;

    let content_type = sniff_content_type(&first_chunk);
    debug!(name=%params.name, content_type, "serving file");

    let body = stream::once(async move { Ok(Bytes::from(first_chunk)) })
        .chain(ReaderStream::new(reader));

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, digest.size_bytes().to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
