// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata fragmenter
//!
//! An update's full metadata document is one `<Update>` element; the
//! protocol carves three slices out of its top-level children:
//!
//! - **core**: what the client needs to evaluate applicability and
//!   identity (`UpdateIdentity`, `Properties`, `ApplicabilityRules`,
//!   `Relationships`)
//! - **extended**: what installation needs (`ExtendedProperties`,
//!   `Files`, `HandlerSpecificData`)
//! - **localized properties**: the entries of
//!   `LocalizedPropertiesCollection` matching a requested language list
//!
//! Children are re-emitted byte-for-byte; the fragmenter never rewrites
//! markup. Core and extended fragments are memoized per identity; the
//! cache is cleared on catalog swap so a new generation cannot serve
//! fragments of a dead one.

use dashmap::DashMap;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;
use update_sync_catalog::{CatalogError, CatalogResult, CatalogSnapshot};
use update_sync_model::UpdateIdentity;

const CORE_CHILDREN: &[&str] = &[
    "UpdateIdentity",
    "Properties",
    "ApplicabilityRules",
    "Relationships",
];
const EXTENDED_CHILDREN: &[&str] = &["ExtendedProperties", "Files", "HandlerSpecificData"];
const LOCALIZED_COLLECTION: &str = "LocalizedPropertiesCollection";

/// Fragment extractor with a per-identity memo for the two
/// locale-independent fragments
#[derive(Debug, Default)]
pub struct MetadataFragmenter {
    core: DashMap<UpdateIdentity, String>,
    extended: DashMap<UpdateIdentity, String>,
}

impl MetadataFragmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The core fragment offered in sync replies
    pub fn core_fragment(
        &self,
        snapshot: &CatalogSnapshot,
        identity: &UpdateIdentity,
    ) -> CatalogResult<String> {
        if let Some(hit) = self.core.get(identity) {
            return Ok(hit.value().clone());
        }
        let (core, _) = self.load_and_memoize(snapshot, identity)?;
        Ok(core)
    }

    /// The extended fragment returned by `GetExtendedUpdateInfo`
    pub fn extended_fragment(
        &self,
        snapshot: &CatalogSnapshot,
        identity: &UpdateIdentity,
    ) -> CatalogResult<String> {
        if let Some(hit) = self.extended.get(identity) {
            return Ok(hit.value().clone());
        }
        let (_, extended) = self.load_and_memoize(snapshot, identity)?;
        Ok(extended)
    }

    /// Localized title/description entries for the requested languages
    ///
    /// Returns the empty string when no entry matches any requested
    /// language. Matching is ASCII case-insensitive. Not memoized: the
    /// result depends on the request's language list.
    pub fn localized_properties(
        &self,
        snapshot: &CatalogSnapshot,
        identity: &UpdateIdentity,
        languages: &[String],
    ) -> CatalogResult<String> {
        let xml = snapshot.read_metadata(identity)?;
        let parsed = split_fragments(&xml).map_err(|reason| CatalogError::Metadata {
            identity: *identity,
            reason,
        })?;
        let Some(collection) = parsed.localized_collection else {
            return Ok(String::new());
        };
        localized_entries(&collection, languages).map_err(|reason| CatalogError::Metadata {
            identity: *identity,
            reason,
        })
    }

    /// Drop every memoized fragment
    pub fn clear(&self) {
        debug!(
            core = self.core.len(),
            extended = self.extended.len(),
            "clearing fragment cache"
        );
        self.core.clear();
        self.extended.clear();
    }

    fn load_and_memoize(
        &self,
        snapshot: &CatalogSnapshot,
        identity: &UpdateIdentity,
    ) -> CatalogResult<(String, String)> {
        let xml = snapshot.read_metadata(identity)?;
        let parsed = split_fragments(&xml).map_err(|reason| CatalogError::Metadata {
            identity: *identity,
            reason,
        })?;
        self.core.insert(*identity, parsed.core.clone());
        self.extended.insert(*identity, parsed.extended.clone());
        Ok((parsed.core, parsed.extended))
    }
}

struct SplitFragments {
    core: String,
    extended: String,
    localized_collection: Option<String>,
}

/// Slice the top-level children of the root element into the three
/// fragment families
fn split_fragments(xml: &str) -> Result<SplitFragments, String> {
    let mut core = String::new();
    let mut extended = String::new();
    let mut localized_collection = None;

    for (name, raw) in top_level_children(xml)? {
        if CORE_CHILDREN.contains(&name.as_str()) {
            core.push_str(raw);
        } else if EXTENDED_CHILDREN.contains(&name.as_str()) {
            extended.push_str(raw);
        } else if name == LOCALIZED_COLLECTION {
            localized_collection = Some(raw.to_string());
        }
    }

    Ok(SplitFragments {
        core,
        extended,
        localized_collection,
    })
}

/// Collect `LocalizedProperties` entries whose `Language` matches any of
/// `languages`
fn localized_entries(collection: &str, languages: &[String]) -> Result<String, String> {
    let mut matched = String::new();
    for (name, raw) in top_level_children(collection)? {
        if name != "LocalizedProperties" {
            continue;
        }
        let Some(language) = element_text(raw, "Language")? else {
            continue;
        };
        if languages
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(&language))
        {
            matched.push_str(raw);
        }
    }
    Ok(matched)
}

/// The top-level children of a document's root element as
/// `(local name, raw slice)` pairs, in document order
fn top_level_children(xml: &str) -> Result<Vec<(String, &str)>, String> {
    let mut reader = Reader::from_str(xml);
    let mut children = Vec::new();

    // Skip ahead to the root element.
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => break,
            Ok(Event::Empty(_)) | Ok(Event::Eof) => return Ok(children),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    loop {
        let start = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                reader.read_to_end(e.name()).map_err(|e| e.to_string())?;
                let end = reader.buffer_position();
                children.push((name, &xml[start..end]));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned();
                let end = reader.buffer_position();
                children.push((name, &xml[start..end]));
            }
            Ok(Event::End(_)) | Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    Ok(children)
}

/// Text content of the first `wanted` element in `xml`, if present
fn element_text(xml: &str, wanted: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut capture = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                capture = e.name().local_name().as_ref() == wanted.as_bytes();
            }
            Ok(Event::Text(t)) if capture => {
                return Ok(Some(
                    t.unescape().map_err(|e| e.to_string())?.into_owned(),
                ));
            }
            Ok(Event::End(_)) => capture = false,
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}
