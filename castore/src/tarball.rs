//! Renders a directory graph into a gzip-compressed tar stream.
//!
//! The archive is written in a single pass while walking the graph, without
//! buffering it anywhere. Files with identical contents and executable bit
//! are only written once, later occurrences become hardlinks to the first
//! one.
use std::collections::{HashMap, HashSet};
use std::io;

use async_compression::tokio::write::GzipEncoder;
use bytes::Bytes;
use futures::future::{self, BoxFuture};
use futures::{stream, Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tar::{EntryType, Header};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

use crate::blobservice::BlobService;
use crate::directoryservice::DirectoryFetcher;
use crate::proto::Directory;
use crate::{Digest, DigestKey, Error};

const BLOCK_SIZE: u64 = 512;

/// Size of the name and link name fields in a tar header.
const NAME_FIELD_LEN: usize = 100;

/// Name used for GNU long name and long link entries.
const GNU_LONG_NAME: &[u8] = b"././@LongLink";

const DIRECTORY_MODE: u32 = 0o777;
const SYMLINK_MODE: u32 = 0o777;
const FILE_MODE: u32 = 0o666;
const EXECUTABLE_FILE_MODE: u32 = 0o777;

/// Buffer size of the pipe between [write_tarball] and [tarball_stream].
const PIPE_BUFFER_SIZE: usize = 64 * 1024;

/// The file name to offer tarballs of the given directory under.
pub fn tarball_file_name(digest: &Digest) -> String {
    format!("{}.tar.gz", digest.hash())
}

/// Writes the contents of `root_directory` as a gzip-compressed tarball into
/// the passed writer, and returns the writer once the gzip stream has been
/// finished.
///
/// Child directories are resolved through `fetcher`, file contents are read
/// from `blob_service`. The root directory itself has no entry, its children
/// end up at the top level of the archive.
///
/// On error, the writer is dropped without finishing the tar and gzip
/// streams, so whatever has been written so far can't be mistaken for a
/// complete archive.
#[instrument(skip_all, fields(root.digest = %root_digest))]
pub async fn write_tarball<W, DF, BS>(
    writer: W,
    root_digest: &Digest,
    root_directory: &Directory,
    fetcher: &DF,
    blob_service: &BS,
) -> Result<W, Error>
where
    W: AsyncWrite + Send + Unpin,
    DF: DirectoryFetcher + ?Sized,
    BS: BlobService + ?Sized,
{
    let mut materializer = Materializer {
        writer: TarWriter::new(writer),
        fetcher,
        blob_service,
        files_seen: HashMap::new(),
        ancestors: HashSet::from([root_digest.key()]),
    };

    if let Err(e) = materializer
        .write_directory(root_digest, root_directory, "")
        .await
    {
        warn!(err=%e, "aborting tarball");
        return Err(e);
    }

    Ok(materializer.writer.finish().await?)
}

/// Runs [write_tarball] in a separate task, and returns the produced bytes
/// as a stream.
///
/// If writing the tarball fails, the stream yields an error after the bytes
/// produced so far, so consumers can abort the transport instead of handing
/// out a truncated archive.
/// Dropping the stream makes the task fail on its next write, which stops
/// the traversal.
pub fn tarball_stream<DF, BS>(
    root_digest: Digest,
    root_directory: Directory,
    fetcher: DF,
    blob_service: BS,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    DF: DirectoryFetcher + 'static,
    BS: BlobService + 'static,
{
    let (w, r) = tokio::io::duplex(PIPE_BUFFER_SIZE);

    let task = tokio::spawn(async move {
        write_tarball(w, &root_digest, &root_directory, &fetcher, &blob_service)
            .await
            .map(drop)
    });

    let outcome = stream::once(async move {
        match task.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Err(io::Error::from(e))),
            Err(e) => Some(Err(io::Error::other(e))),
        }
    })
    .filter_map(future::ready);

    ReaderStream::new(r).chain(outcome)
}

/// State of a single tarball being written.
struct Materializer<'a, W, DF: ?Sized, BS: ?Sized> {
    writer: TarWriter<W>,
    fetcher: &'a DF,
    blob_service: &'a BS,

    /// Paths of the files written so far, by their contents and executable
    /// bit.
    files_seen: HashMap<(DigestKey, bool), String>,
    /// Directories on the path from the root to the one currently visited.
    ancestors: HashSet<DigestKey>,
}

impl<'a, W, DF, BS> Materializer<'a, W, DF, BS>
where
    W: AsyncWrite + Send + Unpin,
    DF: DirectoryFetcher + ?Sized,
    BS: BlobService + ?Sized,
{
    fn write_directory<'b>(
        &'b mut self,
        digest: &'b Digest,
        directory: &'b Directory,
        path: &'b str,
    ) -> BoxFuture<'b, Result<(), Error>> {
        Box::pin(async move {
            for directory_node in &directory.directories {
                let child_path = join_path(path, &directory_node.name)?;
                let child_digest = digest.derive_child(directory_node.digest.as_ref())?;

                let child_key = child_digest.key();
                if self.ancestors.contains(&child_key) {
                    return Err(Error::CycleDetected(child_digest));
                }

                debug!(directory.digest=%child_digest, path=%child_path, "descending");
                let child_directory = self.fetcher.fetch(&child_digest).await?;

                self.writer
                    .append(
                        entry_header(EntryType::Directory, DIRECTORY_MODE, 0),
                        &child_path,
                        None,
                    )
                    .await?;

                self.ancestors.insert(child_key.clone());
                self.write_directory(&child_digest, &child_directory, &child_path)
                    .await?;
                self.ancestors.remove(&child_key);
            }

            for symlink_node in &directory.symlinks {
                let child_path = join_path(path, &symlink_node.name)?;
                self.writer
                    .append(
                        entry_header(EntryType::Symlink, SYMLINK_MODE, 0),
                        &child_path,
                        Some(symlink_node.target.as_str()),
                    )
                    .await?;
            }

            for file_node in &directory.files {
                let child_path = join_path(path, &file_node.name)?;
                let child_digest = digest.derive_child(file_node.digest.as_ref())?;
                let mode = if file_node.is_executable {
                    EXECUTABLE_FILE_MODE
                } else {
                    FILE_MODE
                };

                let dedup_key = (child_digest.key(), file_node.is_executable);
                if let Some(link_path) = self.files_seen.get(&dedup_key) {
                    self.writer
                        .append(
                            entry_header(EntryType::Link, mode, 0),
                            &child_path,
                            Some(link_path.as_str()),
                        )
                        .await?;
                    continue;
                }

                self.write_file(&child_digest, mode, &child_path).await?;
                self.files_seen.insert(dedup_key, child_path);
            }

            Ok(())
        })
    }

    async fn write_file(&mut self, digest: &Digest, mode: u32, path: &str) -> Result<(), Error> {
        let size = digest.size_bytes() as u64;
        let reader = self
            .blob_service
            .open_read(digest)
            .await?
            .ok_or_else(|| Error::NotFound(digest.clone()))?;

        self.writer
            .append(entry_header(EntryType::Regular, mode, size), path, None)
            .await?;

        let copied = self.writer.write_contents(reader.take(size)).await?;
        if copied != size {
            return Err(Error::Internal(format!(
                "blob {} ended after {} bytes",
                digest, copied
            )));
        }

        self.writer.pad(size).await?;
        Ok(())
    }
}

/// Appends a node name to the path of its parent directory.
/// Names need to be a single, regular path component.
fn join_path(parent: &str, name: &str) -> Result<String, Error> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::Internal(format!("invalid node name {:?}", name)));
    }

    if parent.is_empty() {
        Ok(name.to_string())
    } else {
        Ok(format!("{}/{}", parent, name))
    }
}

fn entry_header(entry_type: EntryType, mode: u32, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

/// Writes the tar framing into a gzip stream.
///
/// Names and link names are copied into the headers byte for byte. If they
/// don't fit, a GNU long name (or long link) entry carrying the full value
/// precedes the actual entry.
struct TarWriter<W> {
    inner: GzipEncoder<W>,
}

impl<W> TarWriter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    fn new(writer: W) -> Self {
        Self {
            inner: GzipEncoder::new(writer),
        }
    }

    /// Writes the header of an entry. For regular files, the contents need
    /// to follow with [Self::write_contents] and [Self::pad].
    async fn append(
        &mut self,
        mut header: Header,
        path: &str,
        link_name: Option<&str>,
    ) -> io::Result<()> {
        let path = path.as_bytes();
        if path.len() > NAME_FIELD_LEN {
            self.write_long_entry(EntryType::GNULongName, path).await?;
        }
        let n = path.len().min(NAME_FIELD_LEN);
        header.as_old_mut().name[..n].copy_from_slice(&path[..n]);

        if let Some(link_name) = link_name {
            let link_name = link_name.as_bytes();
            if link_name.len() > NAME_FIELD_LEN {
                self.write_long_entry(EntryType::GNULongLink, link_name)
                    .await?;
            }
            let n = link_name.len().min(NAME_FIELD_LEN);
            header.as_old_mut().linkname[..n].copy_from_slice(&link_name[..n]);
        }

        header.set_cksum();
        self.inner.write_all(header.as_bytes()).await
    }

    async fn write_long_entry(&mut self, entry_type: EntryType, value: &[u8]) -> io::Result<()> {
        // the value is stored NUL-terminated.
        let size = value.len() as u64 + 1;

        let mut header = entry_header(entry_type, 0o644, size);
        header.as_old_mut().name[..GNU_LONG_NAME.len()].copy_from_slice(GNU_LONG_NAME);
        header.set_cksum();

        self.inner.write_all(header.as_bytes()).await?;
        self.inner.write_all(value).await?;
        self.inner.write_all(&[0]).await?;
        self.pad(size).await
    }

    /// Copies entry contents, returning the number of bytes copied.
    async fn write_contents<R>(&mut self, mut reader: R) -> io::Result<u64>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        tokio::io::copy(&mut reader, &mut self.inner).await
    }

    /// Pads the contents of an entry of the given size to the block size.
    async fn pad(&mut self, size: u64) -> io::Result<()> {
        let remainder = size % BLOCK_SIZE;
        if remainder != 0 {
            let padding = [0u8; BLOCK_SIZE as usize];
            self.inner
                .write_all(&padding[..(BLOCK_SIZE - remainder) as usize])
                .await?;
        }
        Ok(())
    }

    /// Writes the end-of-archive marker and finishes the gzip stream.
    async fn finish(mut self) -> io::Result<W> {
        self.inner.write_all(&[0u8; 2 * BLOCK_SIZE as usize]).await?;
        self.inner.shutdown().await?;
        Ok(self.inner.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{join_path, tarball_file_name};
    use crate::fixtures::HELLOWORLD_BLOB_DIGEST;

    #[rstest]
    #[case::top_level("", "a", Some("a"))]
    #[case::nested("a/b", "c", Some("a/b/c"))]
    #[case::dotfile("a", ".keep", Some("a/.keep"))]
    #[case::empty("a", "", None)]
    #[case::dot("a", ".", None)]
    #[case::dotdot("", "..", None)]
    #[case::slash("", "a/b", None)]
    #[case::nul("", "a\0", None)]
    fn join(#[case] parent: &str, #[case] name: &str, #[case] exp: Option<&str>) {
        assert_eq!(exp.map(str::to_string), join_path(parent, name).ok());
    }

    #[test]
    fn file_name() {
        assert_eq!(
            format!("{}.tar.gz", HELLOWORLD_BLOB_DIGEST.hash()),
            tarball_file_name(&HELLOWORLD_BLOB_DIGEST)
        );
    }
}
