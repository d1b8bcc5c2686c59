//! The subset of `build.bazel.remote.execution.v2` messages needed to walk
//! directory graphs and inspect actions and their results, plus Buildbarn's
//! `UncachedActionResult`.
//!
//! Fields that are not declared here are skipped when decoding.
use bytes::Bytes;
use prost::Message;

#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct Digest {
    #[prost(string, tag = "1")]
    pub hash: String,
    #[prost(int64, tag = "2")]
    pub size_bytes: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Directory {
    #[prost(message, repeated, tag = "1")]
    pub files: Vec<FileNode>,
    #[prost(message, repeated, tag = "2")]
    pub directories: Vec<DirectoryNode>,
    #[prost(message, repeated, tag = "3")]
    pub symlinks: Vec<SymlinkNode>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FileNode {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub digest: Option<Digest>,
    #[prost(bool, tag = "4")]
    pub is_executable: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct DirectoryNode {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub digest: Option<Digest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SymlinkNode {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub target: String,
}

/// A root [Directory] together with all of its transitive descendants.
///
/// The children are kept in their encoded form, so their digests can be
/// computed over exactly the bytes the producer serialized.
#[derive(Clone, PartialEq, Message)]
pub struct Tree {
    #[prost(message, optional, tag = "1")]
    pub root: Option<Directory>,
    #[prost(bytes = "bytes", repeated, tag = "2")]
    pub children: Vec<Bytes>,
}

impl Tree {
    /// Assembles a [Tree] from decoded directories.
    pub fn from_directories<'a>(
        root: Directory,
        children: impl IntoIterator<Item = &'a Directory>,
    ) -> Self {
        Self {
            root: Some(root),
            children: children
                .into_iter()
                .map(|child| child.encode_to_vec().into())
                .collect(),
        }
    }

    /// Decodes all children.
    pub fn directory_children(&self) -> Result<Vec<Directory>, prost::DecodeError> {
        self.children
            .iter()
            .map(|child| Directory::decode(child.clone()))
            .collect()
    }
}

/// An action to execute: a [Command], run within an input root directory.
#[derive(Clone, PartialEq, Message)]
pub struct Action {
    #[prost(message, optional, tag = "1")]
    pub command_digest: Option<Digest>,
    #[prost(message, optional, tag = "2")]
    pub input_root_digest: Option<Digest>,
    #[prost(bool, tag = "7")]
    pub do_not_cache: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct Command {
    #[prost(string, repeated, tag = "1")]
    pub arguments: Vec<String>,
    #[prost(message, repeated, tag = "2")]
    pub environment_variables: Vec<EnvironmentVariable>,
    /// Files the command is expected to produce, relative to the working
    /// directory.
    #[prost(string, repeated, tag = "3")]
    pub output_files: Vec<String>,
    #[prost(string, repeated, tag = "4")]
    pub output_directories: Vec<String>,
    #[prost(string, tag = "6")]
    pub working_directory: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct EnvironmentVariable {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ActionResult {
    #[prost(message, repeated, tag = "2")]
    pub output_files: Vec<OutputFile>,
    #[prost(message, repeated, tag = "3")]
    pub output_directories: Vec<OutputDirectory>,
    #[prost(int32, tag = "4")]
    pub exit_code: i32,
    #[prost(bytes = "bytes", tag = "5")]
    pub stdout_raw: Bytes,
    #[prost(message, optional, tag = "6")]
    pub stdout_digest: Option<Digest>,
    #[prost(bytes = "bytes", tag = "7")]
    pub stderr_raw: Bytes,
    #[prost(message, optional, tag = "8")]
    pub stderr_digest: Option<Digest>,
    #[prost(message, repeated, tag = "10")]
    pub output_file_symlinks: Vec<OutputSymlink>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OutputFile {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(message, optional, tag = "2")]
    pub digest: Option<Digest>,
    #[prost(bool, tag = "4")]
    pub is_executable: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct OutputDirectory {
    #[prost(string, tag = "1")]
    pub path: String,
    /// Refers to a [Tree].
    #[prost(message, optional, tag = "3")]
    pub tree_digest: Option<Digest>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OutputSymlink {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(string, tag = "2")]
    pub target: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ExecuteResponse {
    #[prost(message, optional, tag = "1")]
    pub result: Option<ActionResult>,
    #[prost(bool, tag = "2")]
    pub cached_result: bool,
    #[prost(string, tag = "5")]
    pub message: String,
}

/// The outcome of an action that wasn't stored in the action cache, for
/// example because it failed. Stored in the CAS like any other blob.
#[derive(Clone, PartialEq, Message)]
pub struct UncachedActionResult {
    #[prost(message, optional, tag = "1")]
    pub action_digest: Option<Digest>,
    #[prost(message, optional, tag = "2")]
    pub execute_response: Option<ExecuteResponse>,
}
