use thiserror::Error;
use tokio::task::JoinError;

use crate::Digest;

/// Errors related to resolving and materializing directory graphs.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// A (partial) digest reference has an invalid shape.
    #[error("malformed digest reference: {0}")]
    MalformedReference(String),

    /// The backend has no content for the digest.
    #[error("{0} not found")]
    NotFound(Digest),

    /// A tree bundle references a directory it doesn't contain.
    #[error("inconsistent tree: {0}")]
    InconsistentBundle(String),

    /// A path component doesn't name any child directory.
    #[error("subdirectory {0:?} not found")]
    SubdirectoryNotFound(String),

    /// A directory is (transitively) its own descendant.
    #[error("directory {0} is its own descendant")]
    CycleDetected(Digest),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JoinError> for Error {
    fn from(value: JoinError) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(value: prost::DecodeError) -> Self {
        Error::Internal(format!("unable to decode message: {}", value))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::MalformedReference(msg) => Self::new(std::io::ErrorKind::InvalidInput, msg),
            Error::NotFound(digest) => {
                Self::new(std::io::ErrorKind::NotFound, format!("{} not found", digest))
            }
            e => Self::new(std::io::ErrorKind::Other, e.to_string()),
        }
    }
}
