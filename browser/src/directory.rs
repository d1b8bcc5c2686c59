use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use casbrowser_castore::directoryservice::{BlobDirectoryService, DirectoryService, RemoteFetcher};
use casbrowser_castore::Error;
use tracing::instrument;

use crate::errors::{reject, tarball_response};
use crate::listing::DirectoryListing;
use crate::params::{DigestParams, FormatParams};
use crate::AppState;

#[instrument(skip(blob_service))]
pub async fn get(
    Path(params): Path<DigestParams>,
    Query(format): Query<FormatParams>,
    State(AppState { blob_service, .. }): State<AppState>,
) -> Result<Response, StatusCode> {
    let digest = params.digest()?;

    let directory_service = BlobDirectoryService::new(blob_service.clone());
    let directory = directory_service
        .get(&digest)
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::NotFound(digest.clone())))?;

    if format.is_tar() {
        return Ok(tarball_response(
            digest,
            directory,
            RemoteFetcher::new(directory_service),
            blob_service,
        ));
    }

    Ok(Json(DirectoryListing::new(&digest, &directory)).into_response())
}
