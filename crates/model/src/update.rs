// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Updates
//!
//! The catalog holds two families of updates. Categories (detectoids,
//! products, classifications) exist only to structure the prerequisite
//! graph and are never installed. Software updates carry payload files and
//! may aggregate other updates as bundles.

use crate::file::UpdateFile;
use crate::identity::UpdateIdentity;
use crate::prerequisite::PrerequisiteGroup;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Category flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryKind {
    /// Applicability condition evaluated by the client, not installable
    Detectoid,
    /// Product or product family grouping
    Product,
    /// Update classification (security update, driver, tool, ...)
    Classification,
}

/// Software-specific update properties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SoftwareProperties {
    /// Whether this update aggregates children rather than installing itself
    pub is_bundle: bool,

    /// Identities of bundles that carry this update as a child
    pub bundled_by: Vec<UpdateIdentity>,

    /// Payload files
    pub files: Vec<UpdateFile>,
}

/// Variant-specific update payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateKind {
    Category(CategoryKind),
    Software(SoftwareProperties),
}

/// A single update revision in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Identity of this revision
    pub identity: UpdateIdentity,

    /// Conjunction of prerequisite clauses; empty means unconditional
    pub prerequisites: Vec<PrerequisiteGroup>,

    /// Whether a newer update replaces this one
    pub is_superseded: bool,

    /// Category or software payload
    pub kind: UpdateKind,
}

impl Update {
    /// Create a category update
    pub fn category(identity: UpdateIdentity, kind: CategoryKind) -> Self {
        Self {
            identity,
            prerequisites: Vec::new(),
            is_superseded: false,
            kind: UpdateKind::Category(kind),
        }
    }

    /// Create a software update
    pub fn software(identity: UpdateIdentity) -> Self {
        Self {
            identity,
            prerequisites: Vec::new(),
            is_superseded: false,
            kind: UpdateKind::Software(SoftwareProperties::default()),
        }
    }

    /// Add a prerequisite clause
    pub fn with_prerequisite(mut self, group: PrerequisiteGroup) -> Self {
        self.prerequisites.push(group);
        self
    }

    /// Mark this revision superseded
    pub fn with_superseded(mut self) -> Self {
        self.is_superseded = true;
        self
    }

    /// Mark a software update as a bundle container
    ///
    /// No effect on categories.
    pub fn with_bundle(mut self) -> Self {
        if let UpdateKind::Software(props) = &mut self.kind {
            props.is_bundle = true;
        }
        self
    }

    /// Record a bundle parent of a software update
    ///
    /// No effect on categories.
    pub fn with_bundle_parent(mut self, parent: UpdateIdentity) -> Self {
        if let UpdateKind::Software(props) = &mut self.kind {
            props.bundled_by.push(parent);
        }
        self
    }

    /// Attach a payload file to a software update
    ///
    /// No effect on categories.
    pub fn with_file(mut self, file: UpdateFile) -> Self {
        if let UpdateKind::Software(props) = &mut self.kind {
            props.files.push(file);
        }
        self
    }

    pub fn is_category(&self) -> bool {
        matches!(self.kind, UpdateKind::Category(_))
    }

    pub fn is_software(&self) -> bool {
        matches!(self.kind, UpdateKind::Software(_))
    }

    /// Software properties, when this is a software update
    pub fn software_properties(&self) -> Option<&SoftwareProperties> {
        match &self.kind {
            UpdateKind::Software(props) => Some(props),
            UpdateKind::Category(_) => None,
        }
    }

    /// Whether this update aggregates children
    pub fn is_bundle(&self) -> bool {
        self.software_properties().is_some_and(|p| p.is_bundle)
    }

    /// Whether this update is carried by at least one bundle
    pub fn is_bundled(&self) -> bool {
        self.software_properties()
            .is_some_and(|p| !p.bundled_by.is_empty())
    }

    /// Identities of the bundles carrying this update
    pub fn bundle_parents(&self) -> &[UpdateIdentity] {
        self.software_properties()
            .map(|p| p.bundled_by.as_slice())
            .unwrap_or(&[])
    }

    /// Payload files of this update
    pub fn files(&self) -> &[UpdateFile] {
        self.software_properties()
            .map(|p| p.files.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_prerequisites(&self) -> bool {
        !self.prerequisites.is_empty()
    }

    /// Evaluate the prerequisite expression against an installed set
    ///
    /// Every clause must be satisfied; an update without prerequisites is
    /// applicable everywhere.
    pub fn is_applicable(&self, installed: &HashSet<Uuid>) -> bool {
        self.prerequisites
            .iter()
            .all(|group| group.is_satisfied(installed))
    }
}
