// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Content source
//!
//! Read interface over the update payload store, keyed by file digest. The
//! content store is independent of the metadata catalog; the content
//! handlers never touch catalog state.

use crate::file::UpdateFile;
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt};

/// An open payload stream
pub struct ContentStream {
    /// Total length of the stored object in bytes
    pub total_len: u64,

    /// Number of bytes this stream will yield (equals `total_len` unless a
    /// range was requested)
    pub len: u64,

    /// The byte stream itself
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

/// Read interface over the payload store
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Whether the store holds the payload of `file`
    async fn contains(&self, file: &UpdateFile) -> bool;

    /// Stored length of the payload of `file`
    async fn len(&self, file: &UpdateFile) -> io::Result<u64>;

    /// Open the payload of `file`, optionally restricted to an inclusive
    /// byte range
    async fn open(
        &self,
        file: &UpdateFile,
        range: Option<(u64, u64)>,
    ) -> io::Result<ContentStream>;
}

/// Filesystem-backed content store
///
/// Payloads live at `<root>/<directory>/<name>` where the two segments are
/// derived from the file's first digest (uppercase-hex last byte, lowercase
/// full hex).
pub struct FsContentSource {
    root: PathBuf,
}

impl FsContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, file: &UpdateFile) -> io::Result<PathBuf> {
        let (directory, name) = file
            .primary_digest()
            .and_then(|d| d.content_path())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("file {} has no usable digest", file.file_name),
                )
            })?;
        Ok(self.root.join(directory).join(name))
    }
}

#[async_trait]
impl ContentSource for FsContentSource {
    async fn contains(&self, file: &UpdateFile) -> bool {
        match self.path_for(file) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn len(&self, file: &UpdateFile) -> io::Result<u64> {
        let path = self.path_for(file)?;
        Ok(tokio::fs::metadata(&path).await?.len())
    }

    async fn open(
        &self,
        file: &UpdateFile,
        range: Option<(u64, u64)>,
    ) -> io::Result<ContentStream> {
        let path = self.path_for(file)?;
        let mut handle = File::open(&path).await?;
        let total_len = handle.metadata().await?.len();

        match range {
            None => Ok(ContentStream {
                total_len,
                len: total_len,
                reader: Box::new(handle),
            }),
            Some((start, end)) => {
                if start > end || start >= total_len {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("range {start}-{end} outside payload of {total_len} bytes"),
                    ));
                }
                let end = end.min(total_len - 1);
                handle.seek(SeekFrom::Start(start)).await?;
                let len = end - start + 1;
                Ok(ContentStream {
                    total_len,
                    len,
                    reader: Box::new(tokio::io::AsyncReadExt::take(handle, len)),
                })
            }
        }
    }
}
