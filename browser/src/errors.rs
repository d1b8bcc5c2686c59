use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use casbrowser_castore::directoryservice::DirectoryFetcher;
use casbrowser_castore::blobservice::BlobService;
use casbrowser_castore::proto::Directory;
use casbrowser_castore::tarball::{tarball_file_name, tarball_stream};
use casbrowser_castore::{Digest, Error};
use tracing::warn;

/// The status code to respond with when a request fails with the given
/// error.
pub(crate) fn status_code(e: &Error) -> StatusCode {
    match e {
        Error::MalformedReference(_) | Error::InconsistentBundle(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) | Error::SubdirectoryNotFound(_) => StatusCode::NOT_FOUND,
        Error::CycleDetected(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Logs the error a request failed with, and turns it into a status code.
pub(crate) fn reject(e: Error) -> StatusCode {
    let status = status_code(&e);
    warn!(err=%e, status=%status, "request failed");
    status
}

/// Streams a tarball of the given directory.
/// Errors while writing the tarball abort the response body.
pub(crate) fn tarball_response<DF, BS>(
    digest: Digest,
    directory: Directory,
    fetcher: DF,
    blob_service: BS,
) -> Response
where
    DF: DirectoryFetcher + 'static,
    BS: BlobService + 'static,
{
    let content_disposition = format!("attachment; filename=\"{}\"", tarball_file_name(&digest));
    let body = Body::from_stream(tarball_stream(digest, directory, fetcher, blob_service));

    (
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        body,
    )
        .into_response()
}
