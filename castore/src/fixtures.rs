use crate::{
    digests::DigestFunction,
    proto::{self, Directory, DirectoryNode, FileNode, SymlinkNode},
    Digest,
};
use lazy_static::lazy_static;
use prost::Message;

pub const INSTANCE_NAME: &str = "main";

pub const HELLOWORLD_BLOB_CONTENTS: &[u8] = b"Hello World!";
pub const EMPTY_BLOB_CONTENTS: &[u8] = b"";

/// Computes the SHA256 digest of some contents, in [INSTANCE_NAME].
pub fn sha256_digest(data: &[u8]) -> Digest {
    Digest::new(
        INSTANCE_NAME,
        DigestFunction::Sha256.hash_hex(data),
        data.len() as i64,
    )
    .expect("valid digest")
}

/// Computes the digest of a serialized [Directory].
pub fn directory_digest(directory: &Directory) -> Digest {
    sha256_digest(&directory.encode_to_vec())
}

lazy_static! {
    pub static ref HELLOWORLD_BLOB_DIGEST: Digest = sha256_digest(HELLOWORLD_BLOB_CONTENTS);
    pub static ref EMPTY_BLOB_DIGEST: Digest = sha256_digest(EMPTY_BLOB_CONTENTS);

    // 2 bytes
    pub static ref BLOB_A: bytes::Bytes = vec![0x00, 0x01].into();
    pub static ref BLOB_A_DIGEST: Digest = sha256_digest(&BLOB_A);

    // 1MB
    pub static ref BLOB_B: bytes::Bytes = (0..255).collect::<Vec<u8>>().repeat(4 * 1024).into();
    pub static ref BLOB_B_DIGEST: Digest = sha256_digest(&BLOB_B);

    // Directories
    pub static ref DIRECTORY_WITH_KEEP: proto::Directory = proto::Directory {
        directories: vec![],
        files: vec![FileNode {
            name: ".keep".into(),
            digest: Some(EMPTY_BLOB_DIGEST.to_partial()),
            is_executable: false,
        }],
        symlinks: vec![],
    };
    pub static ref DIRECTORY_COMPLICATED: proto::Directory = proto::Directory {
        directories: vec![DirectoryNode {
            name: "keep".into(),
            digest: Some(directory_digest(&DIRECTORY_WITH_KEEP).to_partial()),
        }],
        files: vec![FileNode {
            name: ".keep".into(),
            digest: Some(EMPTY_BLOB_DIGEST.to_partial()),
            is_executable: false,
        }],
        symlinks: vec![SymlinkNode {
            name: "aa".into(),
            target: "bazel-out/k8-fastbuild/bin/foo".into(),
        }],
    };
    pub static ref DIRECTORY_A: Directory = Directory::default();
    pub static ref DIRECTORY_B: Directory = Directory {
        directories: vec![DirectoryNode {
            name: "a".into(),
            digest: Some(directory_digest(&DIRECTORY_A).to_partial()),
        }],
        ..Default::default()
    };
    pub static ref DIRECTORY_C: Directory = Directory {
        directories: vec![
            DirectoryNode {
                name: "a".into(),
                digest: Some(directory_digest(&DIRECTORY_A).to_partial()),
            },
            DirectoryNode {
                name: "a'".into(),
                digest: Some(directory_digest(&DIRECTORY_A).to_partial()),
            }
        ],
        ..Default::default()
    };
}
