// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Catalog fixture builder for tests
//!
//! Builds the smallest realistic catalog shape: one product root, one
//! classification underneath it, and any number of software leaves,
//! bundles and bundled children hanging off the classification. Tracks
//! revision ordinals so tests can speak the protocol's integer handles.

use std::sync::Arc;
use update_sync_model::{
    CategoryKind, FileDigest, PrerequisiteGroup, StaticMetadataSource, Update, UpdateFile,
    UpdateIdentity,
};
use uuid::Uuid;

/// A deterministic digest for test payloads
pub fn sample_digest(bytes: &[u8]) -> FileDigest {
    FileDigest::new("SHA1", bytes.to_vec())
}

/// Builder for a small but structurally complete catalog
pub struct CatalogFixture {
    entries: Vec<Update>,

    /// The root product category
    pub product: UpdateIdentity,

    /// The non-leaf classification category under the product
    pub classification: UpdateIdentity,
}

impl Default for CatalogFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogFixture {
    /// Create a fixture with the product/classification skeleton
    pub fn new() -> Self {
        let product = UpdateIdentity::new(Uuid::new_v4(), 1);
        let classification = UpdateIdentity::new(Uuid::new_v4(), 1);
        Self {
            entries: vec![
                Update::category(product, CategoryKind::Product),
                Update::category(classification, CategoryKind::Classification)
                    .with_prerequisite(PrerequisiteGroup::single(product.id)),
            ],
            product,
            classification,
        }
    }

    /// Add an arbitrary update and return its identity
    pub fn add(&mut self, update: Update) -> UpdateIdentity {
        let identity = update.identity;
        self.entries.push(update);
        identity
    }

    /// Add a root category with no prerequisites
    pub fn add_root(&mut self) -> UpdateIdentity {
        self.add(Update::category(
            UpdateIdentity::new(Uuid::new_v4(), 1),
            CategoryKind::Product,
        ))
    }

    /// Add a standalone software leaf under the classification
    pub fn add_software(&mut self) -> UpdateIdentity {
        let identity = UpdateIdentity::new(Uuid::new_v4(), 100);
        self.add(
            Update::software(identity)
                .with_prerequisite(PrerequisiteGroup::single(self.classification.id)),
        )
    }

    /// Add a superseded software leaf under the classification
    pub fn add_superseded_software(&mut self) -> UpdateIdentity {
        let identity = UpdateIdentity::new(Uuid::new_v4(), 100);
        self.add(
            Update::software(identity)
                .with_prerequisite(PrerequisiteGroup::single(self.classification.id))
                .with_superseded(),
        )
    }

    /// Add a software leaf carrying one payload file
    pub fn add_software_with_file(&mut self, digest: FileDigest, name: &str) -> UpdateIdentity {
        let url = format!("http://upstream.example/{name}");
        let identity = UpdateIdentity::new(Uuid::new_v4(), 100);
        self.add(
            Update::software(identity)
                .with_prerequisite(PrerequisiteGroup::single(self.classification.id))
                .with_file(UpdateFile::new(name, digest, url)),
        )
    }

    /// Add a bundle with `children` bundled software updates
    ///
    /// Returns the bundle identity and the child identities.
    pub fn add_bundle(&mut self, children: usize) -> (UpdateIdentity, Vec<UpdateIdentity>) {
        let bundle = UpdateIdentity::new(Uuid::new_v4(), 200);
        self.add(
            Update::software(bundle)
                .with_prerequisite(PrerequisiteGroup::single(self.classification.id))
                .with_bundle(),
        );
        let child_identities = (0..children)
            .map(|_| {
                let identity = UpdateIdentity::new(Uuid::new_v4(), 100);
                self.add(
                    Update::software(identity)
                        .with_prerequisite(PrerequisiteGroup::single(self.classification.id))
                        .with_bundle_parent(bundle),
                )
            })
            .collect();
        (bundle, child_identities)
    }

    /// The revision ordinal under which an identity was inserted
    ///
    /// Ordinals are the 1-based insertion positions, matching
    /// [`StaticMetadataSource`]'s revision index.
    pub fn ordinal_of(&self, identity: &UpdateIdentity) -> i32 {
        self.entries
            .iter()
            .position(|u| u.identity == *identity)
            .map(|i| i as i32 + 1)
            .expect("identity not in fixture")
    }

    /// Ordinals of the product and classification categories
    pub fn category_ordinals(&self) -> Vec<i32> {
        vec![
            self.ordinal_of(&self.product),
            self.ordinal_of(&self.classification),
        ]
    }

    /// Build the metadata source
    pub fn build(&self) -> Arc<StaticMetadataSource> {
        let mut builder = StaticMetadataSource::builder();
        for update in &self.entries {
            builder = builder.add(update.clone());
        }
        Arc::new(builder.build())
    }
}
