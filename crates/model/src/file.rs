// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Update files
//!
//! A software update carries zero or more payload files. Every file has one
//! or more content digests and one or more upstream URLs; each URL
//! references the digest of the bytes it serves. Content-addressed serving
//! derives its path segments from the file's first digest.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// A content digest: algorithm name plus raw digest bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    /// Digest algorithm, e.g. "SHA1" or "SHA256"
    pub algorithm: String,

    /// Raw digest bytes
    pub value: Vec<u8>,
}

impl FileDigest {
    /// Create a digest from algorithm name and raw bytes
    pub fn new(algorithm: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            value,
        }
    }

    /// Base64 form of the digest bytes
    pub fn base64(&self) -> String {
        BASE64.encode(&self.value)
    }

    /// Content-addressed path segments for this digest
    ///
    /// The directory is the uppercase hex of the last digest byte with no
    /// zero padding (1 or 2 characters); the file name is the full
    /// lowercase hex of the digest. Returns `None` for an empty digest.
    pub fn content_path(&self) -> Option<(String, String)> {
        let last = self.value.last()?;
        Some((format!("{last:X}"), hex::encode(&self.value)))
    }
}

/// An upstream download URL tied to a specific digest of the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUrl {
    /// Upstream (Microsoft Update) URL
    pub url: String,

    /// Base64 digest of the bytes served at `url`
    pub digest_base64: String,
}

impl FileUrl {
    pub fn new(url: impl Into<String>, digest_base64: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            digest_base64: digest_base64.into(),
        }
    }
}

/// A payload file of a software update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFile {
    /// File name as presented to the client for download
    pub file_name: String,

    /// Content digests, strongest first by source convention
    pub digests: Vec<FileDigest>,

    /// Upstream URLs, each referencing one of the digests
    pub urls: Vec<FileUrl>,

    /// Payload size in bytes, when known
    pub size: Option<u64>,
}

impl UpdateFile {
    /// Create a file with a single digest and a matching upstream URL
    pub fn new(
        file_name: impl Into<String>,
        digest: FileDigest,
        mu_url: impl Into<String>,
    ) -> Self {
        let digest_base64 = digest.base64();
        Self {
            file_name: file_name.into(),
            digests: vec![digest],
            urls: vec![FileUrl::new(mu_url, digest_base64)],
            size: None,
        }
    }

    /// Set the payload size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Add an additional digest
    pub fn with_digest(mut self, digest: FileDigest) -> Self {
        self.digests.push(digest);
        self
    }

    /// The file's first digest, if any
    pub fn primary_digest(&self) -> Option<&FileDigest> {
        self.digests.first()
    }

    /// The file's first upstream URL, if any
    pub fn primary_url(&self) -> Option<&FileUrl> {
        self.urls.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_path_segments() {
        let digest = FileDigest::new("SHA1", vec![0xAB, 0x01, 0xCD]);
        let (dir, name) = digest.content_path().unwrap();
        assert_eq!(dir, "CD");
        assert_eq!(name, "ab01cd");
    }

    #[test]
    fn test_content_path_directory_is_unpadded() {
        let digest = FileDigest::new("SHA1", vec![0xFF, 0x05]);
        let (dir, name) = digest.content_path().unwrap();
        assert_eq!(dir, "5");
        assert_eq!(name, "ff05");
    }

    #[test]
    fn test_content_path_empty_digest() {
        let digest = FileDigest::new("SHA1", vec![]);
        assert!(digest.content_path().is_none());
    }

    #[test]
    fn test_file_url_inherits_digest() {
        let digest = FileDigest::new("SHA256", vec![1, 2, 3]);
        let expected = digest.base64();
        let file = UpdateFile::new("setup.exe", digest, "http://mu.example/setup.exe");
        assert_eq!(file.primary_url().unwrap().digest_base64, expected);
    }
}
