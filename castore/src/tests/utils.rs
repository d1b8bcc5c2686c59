use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::blobservice::{BlobReader, BlobService};
use crate::directoryservice::DirectoryFetcher;
use crate::proto::Directory;
use crate::{Digest, DigestKey, Error};

/// A [BlobService] serving whatever it's been given, without checking the
/// contents match the digest. Records every blob opened, in order.
#[derive(Clone, Default)]
pub struct UncheckedBlobService {
    blobs: Arc<Mutex<HashMap<DigestKey, Bytes>>>,
    opened: Arc<Mutex<Vec<DigestKey>>>,
}

impl UncheckedBlobService {
    pub fn insert(&self, digest: &Digest, contents: impl Into<Bytes>) {
        self.blobs.lock().insert(digest.key(), contents.into());
    }

    pub fn opened(&self) -> Vec<DigestKey> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl BlobService for UncheckedBlobService {
    async fn has(&self, digest: &Digest) -> io::Result<bool> {
        Ok(self.blobs.lock().contains_key(&digest.key()))
    }

    async fn open_read(&self, digest: &Digest) -> io::Result<Option<Box<dyn BlobReader>>> {
        self.opened.lock().push(digest.key());
        Ok(self
            .blobs
            .lock()
            .get(&digest.key())
            .map(|contents| Box::new(Cursor::new(contents.clone())) as Box<dyn BlobReader>))
    }

    async fn put(&self, digest: &Digest, contents: Bytes) -> io::Result<()> {
        self.insert(digest, contents);
        Ok(())
    }
}

/// A [DirectoryFetcher] serving directories from a fixed map, regardless of
/// whether their contents hash to the key. Records every fetch, in order.
#[derive(Clone, Default)]
pub struct MapFetcher {
    directories: HashMap<DigestKey, Directory>,
    fetched: Arc<Mutex<Vec<DigestKey>>>,
}

impl MapFetcher {
    pub fn with(mut self, digest: &Digest, directory: Directory) -> Self {
        self.directories.insert(digest.key(), directory);
        self
    }

    pub fn fetched(&self) -> Vec<DigestKey> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl DirectoryFetcher for MapFetcher {
    async fn fetch(&self, digest: &Digest) -> Result<Directory, Error> {
        self.fetched.lock().push(digest.key());
        self.directories
            .get(&digest.key())
            .cloned()
            .ok_or_else(|| Error::NotFound(digest.clone()))
    }
}
