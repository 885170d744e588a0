// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Server process configuration
//!
//! Process inputs: the metadata source directory, the JSON
//! server-configuration document (echoed through config replies), and the
//! optional content store. A content store and the public content root URL
//! must be configured together; the content-addressed URLs handed to
//! clients are built from that root.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A content store was configured without a public root URL
    #[error("content-http-root is required when a content store is configured")]
    ContentRootRequired,

    /// A public root URL was configured without a content store
    #[error("a content store is required when content-http-root is configured")]
    ContentStoreRequired,

    /// Reading a configuration input failed
    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    /// The server-configuration document is not valid JSON
    #[error("invalid server configuration document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },
}

/// Process options for the update sync server
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Socket address to serve on
    pub bind_addr: SocketAddr,

    /// Metadata source directory; the catalog starts empty when absent
    /// and can be loaded later through the management surface
    pub metadata_path: Option<PathBuf>,

    /// JSON server-configuration document
    pub config_path: Option<PathBuf>,

    /// Content store directory
    pub content_path: Option<PathBuf>,

    /// Public base URL for content-addressed file locations
    pub content_http_root: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8530).into(),
            metadata_path: None,
            config_path: None,
            content_path: None,
            content_http_root: None,
        }
    }
}

impl ServerOptions {
    /// Validate the option set
    ///
    /// The content store and the content root URL must be present
    /// together: serving payloads requires advertising their URLs, and
    /// advertising URLs requires something to serve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.content_path, &self.content_http_root) {
            (Some(_), None) => Err(ConfigError::ContentRootRequired),
            (None, Some(_)) => Err(ConfigError::ContentStoreRequired),
            _ => Ok(()),
        }
    }
}

/// Load the server-configuration properties document
pub fn load_properties(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidDocument {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_settings_must_pair() {
        let mut options = ServerOptions {
            content_path: Some("/srv/content".into()),
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ContentRootRequired)
        ));

        options.content_path = None;
        options.content_http_root = Some("http://srv:8530".into());
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ContentStoreRequired)
        ));

        options.content_path = Some("/srv/content".into());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_no_content_is_valid() {
        assert!(ServerOptions::default().validate().is_ok());
    }

    #[test]
    fn test_load_properties_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ServerId": "srv-1"}"#).unwrap();

        let properties = load_properties(&path).unwrap();
        assert_eq!(properties["ServerId"], "srv-1");
    }

    #[test]
    fn test_load_properties_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_properties(&path),
            Err(ConfigError::InvalidDocument { .. })
        ));
    }
}
