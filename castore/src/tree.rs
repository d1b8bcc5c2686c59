//! Lookups of directories inside a [proto::Tree], a root directory shipped
//! together with all of its descendants.
use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::directoryservice::DirectoryFetcher;
use crate::proto::{self, Directory};
use crate::{Digest, DigestKey, Error};

/// An index over all directories contained in a [proto::Tree].
///
/// The children of a tree don't carry their own digests, so they're computed
/// from their encoded form, using the digest function of the tree itself.
/// Lookups ignore the instance name.
#[derive(Debug, Clone)]
pub struct TreeIndex {
    tree_digest: Digest,
    root: Directory,
    children: HashMap<DigestKey, Directory>,
}

impl TreeIndex {
    /// Builds the index for the tree with the given digest.
    pub fn new(tree_digest: Digest, tree: proto::Tree) -> Result<Self, Error> {
        let directories = tree.directory_children().map_err(|e| {
            Error::Internal(format!("unable to decode children of {}: {}", tree_digest, e))
        })?;

        // the digests are computed over the encoded children, as re-encoding
        // isn't guaranteed to reproduce the same bytes.
        let children = tree
            .children
            .iter()
            .zip(directories)
            .map(|(child, directory)| (tree_digest.digest_contents(child).key(), directory))
            .collect();

        Ok(Self {
            tree_digest,
            root: tree.root.unwrap_or_default(),
            children,
        })
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// The number of descendant directories in the tree.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Looks up a descendant directory.
    /// A miss means the tree is incomplete, as it's expected to contain all
    /// descendants of its root.
    pub fn get(&self, digest: &Digest) -> Result<&Directory, Error> {
        self.children.get(&digest.key()).ok_or_else(|| {
            warn!(directory.digest=%digest, "tree lacks referenced directory");
            Error::InconsistentBundle(format!(
                "tree {} doesn't contain directory {}",
                self.tree_digest, digest
            ))
        })
    }

    /// Descends from the root directory into the directory at the given
    /// slash-separated path, returning its digest and contents.
    ///
    /// Empty components are skipped, so `""`, `"/"` and `"a/"` are valid.
    /// When not descending at all, the digest of the tree itself is returned.
    #[instrument(skip(self), fields(tree.digest=%self.tree_digest), err)]
    pub fn resolve_path(&self, path: &str) -> Result<(Digest, &Directory), Error> {
        let mut digest = self.tree_digest.clone();
        let mut directory = &self.root;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            let directory_node = directory
                .directories
                .iter()
                .find(|node| node.name == component)
                .ok_or_else(|| Error::SubdirectoryNotFound(component.to_string()))?;

            digest = digest.derive_child(directory_node.digest.as_ref())?;
            directory = self.get(&digest)?;
        }

        Ok((digest, directory))
    }
}

#[async_trait]
impl DirectoryFetcher for TreeIndex {
    async fn fetch(&self, digest: &Digest) -> Result<Directory, Error> {
        self.get(digest).cloned()
    }
}
