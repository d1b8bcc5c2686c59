use std::sync::Arc;

use axum::{routing::get, Router};
use casbrowser_castore::actioncache::ActionCache;
use casbrowser_castore::blobservice::BlobService;
use tower_http::trace::TraceLayer;

mod action;
mod command;
mod directory;
mod errors;
mod file;
mod listing;
mod params;
mod tree;

pub mod logs;

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub struct AppState {
    blob_service: Arc<dyn BlobService>,
    action_cache: Arc<dyn ActionCache>,
    maximum_message_size_bytes: usize,
}

impl AppState {
    pub fn new(
        blob_service: Arc<dyn BlobService>,
        action_cache: Arc<dyn ActionCache>,
        maximum_message_size_bytes: usize,
    ) -> Self {
        Self {
            blob_service,
            action_cache,
            maximum_message_size_bytes,
        }
    }
}

pub fn gen_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route(
            "/action/:instance/:hash/:size_bytes/",
            get(action::get_action),
        )
        .route(
            "/action_result/:instance/:hash/:size_bytes/",
            get(action::get_action_result),
        )
        .route(
            "/command/:instance/:hash/:size_bytes/",
            get(command::get),
        )
        .route(
            "/directory/:instance/:hash/:size_bytes/",
            get(directory::get),
        )
        .route(
            "/file/:instance/:hash/:size_bytes/:name",
            get(file::get),
        )
        .route("/tree/:instance/:hash/:size_bytes/", get(tree::get))
        .route(
            "/tree/:instance/:hash/:size_bytes/*subdirectory",
            get(tree::get),
        )
        .route(
            "/uncached_action_result/:instance/:hash/:size_bytes/",
            get(action::get_uncached_action_result),
        )
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "Hello from casbrowser"
}
