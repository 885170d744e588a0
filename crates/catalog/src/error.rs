// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for catalog operations

use thiserror::Error;
use update_sync_model::UpdateIdentity;

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while answering requests against the catalog
#[derive(Debug, Error, Clone)]
pub enum CatalogError {
    /// A request arrived before any catalog was loaded
    #[error("no update catalog has been loaded")]
    Unavailable,

    /// A client-supplied revision ordinal is not in the revision index
    #[error("unknown revision {0}")]
    UnknownRevision(i32),

    /// An identity present in the derived indices resolves in neither the
    /// category index nor the update index
    #[error("update {0} is indexed but missing from the catalog")]
    MissingUpdate(UpdateIdentity),

    /// Reading an update's metadata document failed
    #[error("failed to read metadata for update {identity}: {reason}")]
    Metadata {
        identity: UpdateIdentity,
        reason: String,
    },
}
