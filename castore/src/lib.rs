mod digests;
mod errors;
mod tree;

pub mod actioncache;
pub mod blobservice;
pub mod directoryservice;
pub mod fixtures;
pub mod proto;
pub mod tarball;
pub mod utils;

pub use digests::{Digest, DigestFunction, DigestKey, Error as DigestError};
pub use errors::Error;
pub use tree::TreeIndex;

#[cfg(test)]
mod tests;
