// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata source
//!
//! This module defines the read-only interface the catalog consumes, plus
//! the bundled [`StaticMetadataSource`] implementation.
//!
//! The source owns the raw curated catalog: the category and software
//! indices, the per-update metadata XML documents, the revision ordinal
//! map, and the three GUID partitions (roots, non-leaves, leaves). The
//! catalog layer derives everything else from these.

use crate::identity::UpdateIdentity;
use crate::update::{CategoryKind, Update, UpdateKind};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Read-only interface over a curated update catalog
///
/// Implementations must hand out consistent views: the three partitions,
/// the revision index and the two update indices all describe the same
/// catalog generation.
pub trait MetadataSource: Send + Sync {
    /// GUIDs of updates with no prerequisites
    fn root_updates(&self) -> Vec<Uuid>;

    /// GUIDs of updates that other updates depend on
    fn non_leaf_updates(&self) -> Vec<Uuid>;

    /// GUIDs of updates nothing depends on
    fn leaf_updates(&self) -> Vec<Uuid>;

    /// The catalog's revision ordinal map
    fn revision_index(&self) -> HashMap<i32, UpdateIdentity>;

    /// Look up a category (detectoid, product, classification) by identity
    fn category(&self, identity: &UpdateIdentity) -> Option<Arc<Update>>;

    /// Look up a software update by identity
    fn update(&self, identity: &UpdateIdentity) -> Option<Arc<Update>>;

    /// All software updates in the catalog
    fn updates(&self) -> Vec<Arc<Update>>;

    /// Open the full metadata XML document of an update
    fn open_metadata(&self, identity: &UpdateIdentity) -> io::Result<Box<dyn Read + Send>>;
}

/// In-memory metadata source
///
/// Built either programmatically through [`StaticMetadataSourceBuilder`] or
/// from a manifest directory on disk. The GUID partitions are computed from
/// the data itself: an update with no prerequisites is a root, a GUID
/// referenced by any prerequisite clause is a non-leaf, and the rest are
/// leaves.
pub struct StaticMetadataSource {
    categories: HashMap<UpdateIdentity, Arc<Update>>,
    updates: HashMap<UpdateIdentity, Arc<Update>>,
    metadata: HashMap<UpdateIdentity, Arc<str>>,
    revision_index: HashMap<i32, UpdateIdentity>,
    roots: Vec<Uuid>,
    non_leaves: Vec<Uuid>,
    leaves: Vec<Uuid>,
}

impl StaticMetadataSource {
    /// Start building an in-memory source
    pub fn builder() -> StaticMetadataSourceBuilder {
        StaticMetadataSourceBuilder::default()
    }

    /// Load a source from a manifest directory
    ///
    /// The directory must contain `manifest.json`; metadata XML referenced
    /// by relative path is read from the same directory, and updates
    /// without one get a synthesized document.
    pub fn from_manifest_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let raw = std::fs::read_to_string(dir.join("manifest.json"))?;
        let manifest: Manifest = serde_json::from_str(&raw).map_err(io::Error::other)?;

        let mut builder = Self::builder();
        for entry in manifest.updates {
            let xml = match &entry.metadata {
                Some(rel) => Some(std::fs::read_to_string(dir.join(rel))?),
                None => None,
            };
            let update = entry.into_update();
            builder = match xml {
                Some(xml) => builder.add_with_metadata(update, xml),
                None => builder.add(update),
            };
        }
        Ok(builder.build())
    }
}

impl MetadataSource for StaticMetadataSource {
    fn root_updates(&self) -> Vec<Uuid> {
        self.roots.clone()
    }

    fn non_leaf_updates(&self) -> Vec<Uuid> {
        self.non_leaves.clone()
    }

    fn leaf_updates(&self) -> Vec<Uuid> {
        self.leaves.clone()
    }

    fn revision_index(&self) -> HashMap<i32, UpdateIdentity> {
        self.revision_index.clone()
    }

    fn category(&self, identity: &UpdateIdentity) -> Option<Arc<Update>> {
        self.categories.get(identity).cloned()
    }

    fn update(&self, identity: &UpdateIdentity) -> Option<Arc<Update>> {
        self.updates.get(identity).cloned()
    }

    fn updates(&self) -> Vec<Arc<Update>> {
        self.updates.values().cloned().collect()
    }

    fn open_metadata(&self, identity: &UpdateIdentity) -> io::Result<Box<dyn Read + Send>> {
        let xml = self.metadata.get(identity).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no metadata for update {identity}"),
            )
        })?;
        Ok(Box::new(Cursor::new(xml.as_bytes().to_vec())))
    }
}

/// Builder for [`StaticMetadataSource`]
///
/// Revision ordinals are assigned in insertion order starting at 1, and the
/// GUID partitions preserve insertion order.
#[derive(Default)]
pub struct StaticMetadataSourceBuilder {
    entries: Vec<(Arc<Update>, Arc<str>)>,
}

impl StaticMetadataSourceBuilder {
    /// Add an update, synthesizing its metadata document
    pub fn add(self, update: Update) -> Self {
        let xml = default_metadata_xml(&update);
        self.add_with_metadata(update, xml)
    }

    /// Add an update with an explicit metadata document
    pub fn add_with_metadata(mut self, update: Update, metadata_xml: impl Into<Arc<str>>) -> Self {
        self.entries.push((Arc::new(update), metadata_xml.into()));
        self
    }

    /// Finish building the source
    pub fn build(self) -> StaticMetadataSource {
        let mut categories = HashMap::new();
        let mut updates = HashMap::new();
        let mut metadata = HashMap::new();
        let mut revision_index = HashMap::new();

        // GUIDs in first-seen order, so partition order is deterministic.
        let mut seen_ids: Vec<Uuid> = Vec::new();
        let mut latest: HashMap<Uuid, Arc<Update>> = HashMap::new();
        let mut referenced: HashSet<Uuid> = HashSet::new();

        for (ordinal, (update, xml)) in self.entries.into_iter().enumerate() {
            let identity = update.identity;
            revision_index.insert(ordinal as i32 + 1, identity);
            metadata.insert(identity, xml);

            for group in &update.prerequisites {
                referenced.extend(group.any_of.iter().copied());
            }

            if !latest.contains_key(&identity.id) {
                seen_ids.push(identity.id);
            }
            match latest.get(&identity.id) {
                Some(existing) if existing.identity.revision >= identity.revision => {}
                _ => {
                    latest.insert(identity.id, update.clone());
                }
            }

            if update.is_category() {
                categories.insert(identity, update);
            } else {
                updates.insert(identity, update);
            }
        }

        let mut roots = Vec::new();
        let mut non_leaves = Vec::new();
        let mut leaves = Vec::new();
        for id in seen_ids {
            let update = &latest[&id];
            if !update.has_prerequisites() {
                roots.push(id);
            } else if referenced.contains(&id) {
                non_leaves.push(id);
            } else {
                leaves.push(id);
            }
        }

        StaticMetadataSource {
            categories,
            updates,
            metadata,
            revision_index,
            roots,
            non_leaves,
            leaves,
        }
    }
}

/// Synthesize a metadata document from an update's structured fields
///
/// The shape mirrors the curated store's XML: one `<Update>` element whose
/// top-level children are the slices the fragmenter carves out.
pub fn default_metadata_xml(update: &Update) -> String {
    let update_type = match &update.kind {
        UpdateKind::Category(CategoryKind::Detectoid) => "Detectoid",
        UpdateKind::Category(_) => "Category",
        UpdateKind::Software(_) => "Software",
    };

    let mut xml = String::new();
    xml.push_str("<Update xmlns=\"http://schemas.microsoft.com/msus/2002/12/Update\">");
    xml.push_str(&format!(
        "<UpdateIdentity UpdateID=\"{}\" RevisionNumber=\"{}\"/>",
        update.identity.id, update.identity.revision
    ));
    xml.push_str(&format!(
        "<Properties UpdateType=\"{update_type}\" ExplicitlyDeployable=\"true\"/>"
    ));

    if update.has_prerequisites() || update.is_bundled() {
        xml.push_str("<Relationships>");
        if update.has_prerequisites() {
            xml.push_str("<Prerequisites>");
            for group in &update.prerequisites {
                if let [only] = group.any_of.as_slice() {
                    xml.push_str(&format!("<UpdateIdentity UpdateID=\"{only}\"/>"));
                } else {
                    xml.push_str("<AtLeastOne>");
                    for id in &group.any_of {
                        xml.push_str(&format!("<UpdateIdentity UpdateID=\"{id}\"/>"));
                    }
                    xml.push_str("</AtLeastOne>");
                }
            }
            xml.push_str("</Prerequisites>");
        }
        if update.is_bundled() {
            xml.push_str("<BundledBy>");
            for parent in update.bundle_parents() {
                xml.push_str(&format!(
                    "<Revision UpdateID=\"{}\" RevisionNumber=\"{}\"/>",
                    parent.id, parent.revision
                ));
            }
            xml.push_str("</BundledBy>");
        }
        xml.push_str("</Relationships>");
    }

    xml.push_str("<ApplicabilityRules><IsInstalled><b.True/></IsInstalled></ApplicabilityRules>");

    if !update.files().is_empty() {
        xml.push_str("<Files>");
        for file in update.files() {
            let digest = file
                .primary_digest()
                .map(|d| d.base64())
                .unwrap_or_default();
            xml.push_str(&format!(
                "<File FileName=\"{}\" Digest=\"{digest}\"/>",
                file.file_name
            ));
        }
        xml.push_str("</Files>");
    }

    xml.push_str(
        "<LocalizedPropertiesCollection><LocalizedProperties><Language>en</Language>",
    );
    xml.push_str(&format!("<Title>Update {}</Title>", update.identity.id));
    xml.push_str("</LocalizedProperties></LocalizedPropertiesCollection>");
    xml.push_str("</Update>");
    xml
}

// Manifest file shapes for `from_manifest_dir`.

#[derive(Deserialize)]
struct Manifest {
    updates: Vec<ManifestUpdate>,
}

#[derive(Deserialize)]
struct ManifestUpdate {
    identity: UpdateIdentity,
    kind: ManifestKind,
    #[serde(default)]
    prerequisites: Vec<Vec<Uuid>>,
    #[serde(default)]
    superseded: bool,
    #[serde(default)]
    bundle: bool,
    #[serde(default)]
    bundled_by: Vec<UpdateIdentity>,
    #[serde(default)]
    files: Vec<ManifestFile>,
    #[serde(default)]
    metadata: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ManifestKind {
    Detectoid,
    Product,
    Classification,
    Software,
}

#[derive(Deserialize)]
struct ManifestFile {
    file_name: String,
    digest_algorithm: String,
    digest_base64: String,
    url: String,
    #[serde(default)]
    size: Option<u64>,
}

impl ManifestUpdate {
    fn into_update(self) -> Update {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD as BASE64;

        let mut update = match self.kind {
            ManifestKind::Detectoid => Update::category(self.identity, CategoryKind::Detectoid),
            ManifestKind::Product => Update::category(self.identity, CategoryKind::Product),
            ManifestKind::Classification => {
                Update::category(self.identity, CategoryKind::Classification)
            }
            ManifestKind::Software => Update::software(self.identity),
        };
        for group in self.prerequisites {
            update = update.with_prerequisite(crate::PrerequisiteGroup::any_of(group));
        }
        if self.superseded {
            update = update.with_superseded();
        }
        if self.bundle {
            update = update.with_bundle();
        }
        for parent in self.bundled_by {
            update = update.with_bundle_parent(parent);
        }
        for file in self.files {
            let value = BASE64.decode(&file.digest_base64).unwrap_or_default();
            let mut f = crate::UpdateFile::new(
                file.file_name,
                crate::FileDigest::new(file.digest_algorithm, value),
                file.url,
            );
            if let Some(size) = file.size {
                f = f.with_size(size);
            }
            update = update.with_file(f);
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prerequisite::PrerequisiteGroup;

    fn identity(revision: i32) -> UpdateIdentity {
        UpdateIdentity::new(Uuid::new_v4(), revision)
    }

    #[test]
    fn test_partitions_from_prerequisite_graph() {
        let product = Update::category(identity(1), CategoryKind::Product);
        let product_id = product.identity.id;
        let detectoid = Update::category(identity(1), CategoryKind::Detectoid)
            .with_prerequisite(PrerequisiteGroup::single(product_id));
        let detectoid_id = detectoid.identity.id;
        let software = Update::software(identity(100))
            .with_prerequisite(PrerequisiteGroup::single(detectoid_id));
        let software_id = software.identity.id;

        let source = StaticMetadataSource::builder()
            .add(product)
            .add(detectoid)
            .add(software)
            .build();

        assert_eq!(source.root_updates(), vec![product_id]);
        assert_eq!(source.non_leaf_updates(), vec![detectoid_id]);
        assert_eq!(source.leaf_updates(), vec![software_id]);
    }

    #[test]
    fn test_revision_ordinals_follow_insertion_order() {
        let first = Update::category(identity(1), CategoryKind::Product);
        let second = Update::software(identity(5))
            .with_prerequisite(PrerequisiteGroup::single(first.identity.id));
        let first_identity = first.identity;
        let second_identity = second.identity;

        let source = StaticMetadataSource::builder().add(first).add(second).build();
        let index = source.revision_index();
        assert_eq!(index[&1], first_identity);
        assert_eq!(index[&2], second_identity);
    }

    #[test]
    fn test_lookup_respects_category_software_split() {
        let category = Update::category(identity(1), CategoryKind::Classification);
        let category_identity = category.identity;
        let software = Update::software(identity(1))
            .with_prerequisite(PrerequisiteGroup::single(category_identity.id));
        let software_identity = software.identity;

        let source = StaticMetadataSource::builder()
            .add(category)
            .add(software)
            .build();

        assert!(source.category(&category_identity).is_some());
        assert!(source.update(&category_identity).is_none());
        assert!(source.update(&software_identity).is_some());
        assert!(source.category(&software_identity).is_none());
    }

    #[test]
    fn test_open_metadata_round_trip() {
        let update = Update::category(identity(1), CategoryKind::Product);
        let target = update.identity;
        let source = StaticMetadataSource::builder()
            .add_with_metadata(update, "<Update><Properties/></Update>")
            .build();

        let mut xml = String::new();
        source
            .open_metadata(&target)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert_eq!(xml, "<Update><Properties/></Update>");
    }

    #[test]
    fn test_open_metadata_unknown_identity() {
        let source = StaticMetadataSource::builder().build();
        match source.open_metadata(&identity(1)) {
            Ok(_) => panic!("expected error"),
            Err(err) => assert_eq!(err.kind(), io::ErrorKind::NotFound),
        }
    }

    #[test]
    fn test_synthesized_metadata_carries_fragment_children() {
        let software = Update::software(identity(3))
            .with_prerequisite(PrerequisiteGroup::single(Uuid::new_v4()));
        let xml = default_metadata_xml(&software);
        assert!(xml.contains("<UpdateIdentity"));
        assert!(xml.contains("<Properties"));
        assert!(xml.contains("<Relationships>"));
        assert!(xml.contains("<ApplicabilityRules>"));
        assert!(xml.contains("<LocalizedPropertiesCollection>"));
    }
}
