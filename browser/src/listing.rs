use casbrowser_castore::proto::{self, Directory};
use casbrowser_castore::Digest;
use serde::Serialize;

/// A digest as rendered in listings, without the instance name.
#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct DigestRef {
    hash: String,
    size_bytes: i64,
}

impl From<&proto::Digest> for DigestRef {
    fn from(value: &proto::Digest) -> Self {
        Self {
            hash: value.hash.clone(),
            size_bytes: value.size_bytes,
        }
    }
}

impl From<&Digest> for DigestRef {
    fn from(value: &Digest) -> Self {
        Self {
            hash: value.hash().to_string(),
            size_bytes: value.size_bytes(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct DirectoryEntry {
    name: String,
    digest: Option<DigestRef>,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct FileEntry {
    name: String,
    digest: Option<DigestRef>,
    is_executable: bool,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct SymlinkEntry {
    name: String,
    target: String,
}

/// The contents of a single directory, in the order the directory lists
/// them.
#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct DirectoryListing {
    instance_name: String,
    digest: DigestRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    has_parent_directory: Option<bool>,
    directories: Vec<DirectoryEntry>,
    files: Vec<FileEntry>,
    symlinks: Vec<SymlinkEntry>,
}

impl DirectoryListing {
    pub(crate) fn new(digest: &Digest, directory: &Directory) -> Self {
        Self {
            instance_name: digest.instance_name().to_string(),
            digest: digest.into(),
            has_parent_directory: None,
            directories: directory
                .directories
                .iter()
                .map(|node| DirectoryEntry {
                    name: node.name.clone(),
                    digest: node.digest.as_ref().map(Into::into),
                })
                .collect(),
            files: directory
                .files
                .iter()
                .map(|node| FileEntry {
                    name: node.name.clone(),
                    digest: node.digest.as_ref().map(Into::into),
                    is_executable: node.is_executable,
                })
                .collect(),
            symlinks: directory
                .symlinks
                .iter()
                .map(|node| SymlinkEntry {
                    name: node.name.clone(),
                    target: node.target.clone(),
                })
                .collect(),
        }
    }

    /// Marks the listing as being of a directory nested in a tree.
    pub(crate) fn with_parent_directory(mut self, has_parent_directory: bool) -> Self {
        self.has_parent_directory = Some(has_parent_directory);
        self
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct OutputDirectoryEntry {
    path: String,
    tree_digest: Option<DigestRef>,
}

impl From<&proto::OutputDirectory> for OutputDirectoryEntry {
    fn from(value: &proto::OutputDirectory) -> Self {
        Self {
            path: value.path.clone(),
            tree_digest: value.tree_digest.as_ref().map(Into::into),
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct OutputFileEntry {
    path: String,
    digest: Option<DigestRef>,
    is_executable: bool,
}

impl From<&proto::OutputFile> for OutputFileEntry {
    fn from(value: &proto::OutputFile) -> Self {
        Self {
            path: value.path.clone(),
            digest: value.digest.as_ref().map(Into::into),
            is_executable: value.is_executable,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct OutputSymlinkEntry {
    path: String,
    target: String,
}

impl From<&proto::OutputSymlink> for OutputSymlinkEntry {
    fn from(value: &proto::OutputSymlink) -> Self {
        Self {
            path: value.path.clone(),
            target: value.target.clone(),
        }
    }
}
