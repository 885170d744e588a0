// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Catalog snapshot
//!
//! One immutable generation of the catalog: the metadata source it was
//! built from plus every derived index. Indexing happens once, off to the
//! side, before the snapshot is published; readers never observe a
//! partially built snapshot.
//!
//! Derived indices:
//! - the revision ordinal map (ordinal → identity), copied from the source
//! - per logical GUID, the identity of its newest revision and the ordinal
//!   under which that revision is indexed
//! - the ordered list of leaf GUIDs whose latest revision is a software
//!   update

use crate::error::{CatalogError, CatalogResult};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};
use update_sync_model::{MetadataSource, Update, UpdateIdentity};
use uuid::Uuid;

/// An immutable, fully indexed catalog generation
pub struct CatalogSnapshot {
    source: Arc<dyn MetadataSource>,
    roots: Vec<Uuid>,
    non_leaves: Vec<Uuid>,
    leaves: Vec<Uuid>,
    revision_index: HashMap<i32, UpdateIdentity>,
    id_to_latest_revision: HashMap<Uuid, i32>,
    id_to_latest_identity: HashMap<Uuid, UpdateIdentity>,
    software_leaf_ids: Vec<Uuid>,
}

impl CatalogSnapshot {
    /// Build a snapshot from a metadata source
    ///
    /// Inverts the source's revision map, selects the largest revision per
    /// logical GUID, and intersects the leaf partition with the software
    /// index (order preserved).
    pub fn index(source: Arc<dyn MetadataSource>) -> Self {
        let roots = source.root_updates();
        let non_leaves = source.non_leaf_updates();
        let leaves = source.leaf_updates();
        let revision_index = source.revision_index();

        let mut id_to_latest_revision: HashMap<Uuid, i32> = HashMap::new();
        let mut id_to_latest_identity: HashMap<Uuid, UpdateIdentity> = HashMap::new();
        for (ordinal, identity) in &revision_index {
            match id_to_latest_identity.get(&identity.id) {
                Some(current) if current.revision >= identity.revision => {}
                _ => {
                    id_to_latest_identity.insert(identity.id, *identity);
                    id_to_latest_revision.insert(identity.id, *ordinal);
                }
            }
        }

        let software_leaf_ids: Vec<Uuid> = leaves
            .iter()
            .filter(|id| {
                id_to_latest_identity
                    .get(id)
                    .is_some_and(|identity| source.update(identity).is_some())
            })
            .copied()
            .collect();

        debug!(
            roots = roots.len(),
            non_leaves = non_leaves.len(),
            leaves = leaves.len(),
            revisions = revision_index.len(),
            software_leaves = software_leaf_ids.len(),
            "catalog snapshot indexed"
        );

        Self {
            source,
            roots,
            non_leaves,
            leaves,
            revision_index,
            id_to_latest_revision,
            id_to_latest_identity,
            software_leaf_ids,
        }
    }

    /// GUIDs of updates with no prerequisites
    pub fn root_updates(&self) -> &[Uuid] {
        &self.roots
    }

    /// GUIDs of updates that other updates depend on
    pub fn non_leaf_updates(&self) -> &[Uuid] {
        &self.non_leaves
    }

    /// GUIDs of updates nothing depends on
    pub fn leaf_updates(&self) -> &[Uuid] {
        &self.leaves
    }

    /// Leaf GUIDs whose latest revision is a software update, in leaf
    /// partition order
    pub fn software_leaf_ids(&self) -> &[Uuid] {
        &self.software_leaf_ids
    }

    /// Number of revisions in the revision index
    pub fn revision_count(&self) -> usize {
        self.revision_index.len()
    }

    /// Resolve a client-supplied revision ordinal
    pub fn identity_for_revision(&self, revision: i32) -> CatalogResult<UpdateIdentity> {
        self.revision_index
            .get(&revision)
            .copied()
            .ok_or(CatalogError::UnknownRevision(revision))
    }

    /// The identity of the newest revision of a logical GUID
    pub fn latest_identity(&self, id: &Uuid) -> Option<UpdateIdentity> {
        self.id_to_latest_identity.get(id).copied()
    }

    /// The revision ordinal of the newest revision of a logical GUID
    pub fn latest_revision(&self, id: &Uuid) -> Option<i32> {
        self.id_to_latest_revision.get(id).copied()
    }

    /// Look up a category by identity
    pub fn category(&self, identity: &UpdateIdentity) -> Option<Arc<Update>> {
        self.source.category(identity)
    }

    /// Look up a software update by identity
    pub fn update(&self, identity: &UpdateIdentity) -> Option<Arc<Update>> {
        self.source.update(identity)
    }

    /// Resolve an identity in the category index, else the update index
    ///
    /// An identity reachable from the derived indices must resolve in one
    /// of the two; anything else is a corrupt source.
    pub fn resolve(&self, identity: &UpdateIdentity) -> CatalogResult<Arc<Update>> {
        self.category(identity)
            .or_else(|| self.update(identity))
            .ok_or_else(|| {
                warn!(%identity, "identity present in indices resolves in neither index");
                CatalogError::MissingUpdate(*identity)
            })
    }

    /// All software updates of this generation
    pub fn updates(&self) -> Vec<Arc<Update>> {
        self.source.updates()
    }

    /// Read an update's full metadata document
    pub fn read_metadata(&self, identity: &UpdateIdentity) -> CatalogResult<String> {
        let mut reader = self
            .source
            .open_metadata(identity)
            .map_err(|e| CatalogError::Metadata {
                identity: *identity,
                reason: e.to_string(),
            })?;
        let mut xml = String::new();
        reader
            .read_to_string(&mut xml)
            .map_err(|e| CatalogError::Metadata {
                identity: *identity,
                reason: e.to_string(),
            })?;
        Ok(xml)
    }
}
