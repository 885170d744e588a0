// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Catalog holder
//!
//! Atomic publication of catalog snapshots. Swapping the metadata source
//! builds a fully indexed [`CatalogSnapshot`] off to the side, then
//! publishes it with a single pointer store: request handlers that loaded
//! the previous snapshot keep reading it until their reply is materialized,
//! new requests see the new generation, and nobody sees partial indices.
//!
//! Catalog swaps are rare and operator-driven; reads are wait-free.

use crate::error::{CatalogError, CatalogResult};
use crate::snapshot::CatalogSnapshot;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::info;
use update_sync_model::MetadataSource;

/// Holder of the live catalog snapshot
#[derive(Default)]
pub struct CatalogHolder {
    snapshot: ArcSwapOption<CatalogSnapshot>,
}

impl CatalogHolder {
    /// Create a holder with no catalog loaded
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the catalog
    ///
    /// `Some(source)` indexes the source and publishes the new snapshot;
    /// `None` clears the catalog. Either way the change is one atomic
    /// store.
    pub fn set_metadata_source(&self, source: Option<Arc<dyn MetadataSource>>) {
        match source {
            Some(source) => {
                let snapshot = CatalogSnapshot::index(source);
                info!(
                    revisions = snapshot.revision_count(),
                    "publishing new catalog snapshot"
                );
                self.snapshot.store(Some(Arc::new(snapshot)));
            }
            None => {
                info!("clearing catalog");
                self.snapshot.store(None);
            }
        }
    }

    /// Pin the current snapshot for the duration of one reply
    pub fn snapshot(&self) -> CatalogResult<Arc<CatalogSnapshot>> {
        self.snapshot
            .load_full()
            .ok_or(CatalogError::Unavailable)
    }

    /// Whether a catalog is currently loaded
    pub fn is_loaded(&self) -> bool {
        self.snapshot.load().is_some()
    }
}
