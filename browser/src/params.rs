use axum::http::StatusCode;
use casbrowser_castore::Digest;
use serde::Deserialize;
use tracing::warn;

fn parse_digest(instance: &str, hash: &str, size_bytes: i64) -> Result<Digest, StatusCode> {
    Digest::new(instance, hash, size_bytes).map_err(|e| {
        warn!(err=%e, "invalid digest in url");
        StatusCode::BAD_REQUEST
    })
}

/// The digest of the object a page is about, as encoded in its URL.
#[derive(Debug, Deserialize)]
pub(crate) struct DigestParams {
    instance: String,
    hash: String,
    size_bytes: i64,
}

impl DigestParams {
    pub(crate) fn digest(&self) -> Result<Digest, StatusCode> {
        parse_digest(&self.instance, &self.hash, self.size_bytes)
    }
}

/// A digest, followed by a path inside the object it refers to.
#[derive(Debug, Deserialize)]
pub(crate) struct TreeParams {
    instance: String,
    hash: String,
    size_bytes: i64,
    #[serde(default)]
    pub(crate) subdirectory: String,
}

impl TreeParams {
    pub(crate) fn digest(&self) -> Result<Digest, StatusCode> {
        parse_digest(&self.instance, &self.hash, self.size_bytes)
    }
}

/// A digest, followed by the name to offer its contents under.
#[derive(Debug, Deserialize)]
pub(crate) struct FileParams {
    instance: String,
    hash: String,
    size_bytes: i64,
    pub(crate) name: String,
}

impl FileParams {
    pub(crate) fn digest(&self) -> Result<Digest, StatusCode> {
        parse_digest(&self.instance, &self.hash, self.size_bytes)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FormatParams {
    format: Option<String>,
}

impl FormatParams {
    /// Whether a tarball was requested, instead of a listing.
    pub(crate) fn is_tar(&self) -> bool {
        self.format.as_deref() == Some("tar")
    }
}
