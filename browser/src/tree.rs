use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use casbrowser_castore::directoryservice::read_message;
use casbrowser_castore::proto::Tree;
use casbrowser_castore::{Error, TreeIndex};
use tracing::{debug, instrument};

use crate::errors::{reject, tarball_response};
use crate::listing::DirectoryListing;
use crate::params::{FormatParams, TreeParams};
use crate::AppState;

#[instrument(skip(blob_service, maximum_message_size_bytes))]
pub async fn get(
    Path(params): Path<TreeParams>,
    Query(format): Query<FormatParams>,
    State(AppState {
        blob_service,
        maximum_message_size_bytes,
        ..
    }): State<AppState>,
) -> Result<Response, StatusCode> {
    let tree_digest = params.digest()?;

    let tree: Tree = read_message(&blob_service, &tree_digest, Some(maximum_message_size_bytes))
        .await
        .map_err(reject)?
        .ok_or_else(|| reject(Error::NotFound(tree_digest.clone())))?;

    let index = TreeIndex::new(tree_digest, tree).map_err(reject)?;
    debug!(children = index.len(), "indexed tree");

    let (digest, directory) = index
        .resolve_path(&params.subdirectory)
        .map(|(digest, directory)| (digest, directory.clone()))
        .map_err(reject)?;

    if format.is_tar() {
        return Ok(tarball_response(digest, directory, index, blob_service));
    }

    let has_parent_directory = params.subdirectory.split('/').any(|c| !c.is_empty());
    Ok(Json(
        DirectoryListing::new(&digest, &directory).with_parent_directory(has_parent_directory),
    )
    .into_response())
}
