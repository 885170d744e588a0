// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Extended update info responder
//!
//! Answers `GetExtendedUpdateInfo`: the client names the revisions it was
//! offered and asks for the metadata families it still needs (extended
//! fragments, localized properties) plus the download locations of every
//! file those updates carry.
//!
//! File URLs are content-addressed when a content store is configured
//! (`{root}/Content/{HEX(last digest byte)}/{hex(digest)}`), otherwise the
//! upstream URL is handed through verbatim.

use crate::fragments::MetadataFragmenter;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use update_sync_catalog::{CatalogResult, CatalogSnapshot};
use update_sync_model::{Update, UpdateIdentity};
use update_sync_protocol::{
    ExtendedInfoRequest, ExtendedUpdateInfo, FileLocation, UpdateData, XmlUpdateFragmentType,
};

/// Answer a `GetExtendedUpdateInfo` call against a pinned snapshot
pub fn get_extended_update_info(
    snapshot: &CatalogSnapshot,
    fragmenter: &MetadataFragmenter,
    content_root: Option<&str>,
    request: &ExtendedInfoRequest,
) -> CatalogResult<ExtendedUpdateInfo> {
    let mut resolved: Vec<(i32, UpdateIdentity, Arc<Update>)> =
        Vec::with_capacity(request.revision_ids.len());
    for &revision in &request.revision_ids {
        let identity = snapshot.identity_for_revision(revision)?;
        let update = snapshot.resolve(&identity)?;
        resolved.push((revision, identity, update));
    }

    let mut info = ExtendedUpdateInfo::default();

    if request
        .info_types
        .contains(&XmlUpdateFragmentType::Extended)
    {
        for (revision, identity, _) in &resolved {
            info.updates.push(UpdateData {
                id: *revision,
                xml: fragmenter.extended_fragment(snapshot, identity)?,
            });
        }
    }

    if request
        .info_types
        .contains(&XmlUpdateFragmentType::LocalizedProperties)
    {
        for (revision, identity, _) in &resolved {
            let xml = fragmenter.localized_properties(snapshot, identity, &request.locales)?;
            if !xml.is_empty() {
                info.updates.push(UpdateData {
                    id: *revision,
                    xml,
                });
            }
        }
    }

    let mut seen_identities: HashSet<UpdateIdentity> = HashSet::new();
    for (_, identity, update) in &resolved {
        if !seen_identities.insert(*identity) {
            continue;
        }
        for file in update.files() {
            let Some(url) = file.primary_url() else {
                warn!(%identity, file = %file.file_name, "update file has no URL, skipping");
                continue;
            };
            let file_digest = match BASE64.decode(&url.digest_base64) {
                Ok(bytes) => bytes,
                Err(_) => {
                    warn!(%identity, file = %file.file_name, "undecodable file digest, skipping");
                    continue;
                }
            };
            let location_url = content_root
                .and_then(|root| {
                    file.primary_digest()
                        .and_then(|digest| digest.content_path())
                        .map(|(directory, name)| format!("{root}/Content/{directory}/{name}"))
                })
                .unwrap_or_else(|| url.url.clone());
            info.file_locations.push(FileLocation {
                file_digest,
                url: location_url,
            });
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use update_sync_test_utils::{sample_digest, CatalogFixture};

    fn request(revisions: Vec<i32>, info_types: Vec<XmlUpdateFragmentType>) -> ExtendedInfoRequest {
        ExtendedInfoRequest {
            revision_ids: revisions,
            info_types,
            locales: vec!["en".to_string()],
        }
    }

    #[test]
    fn test_extended_fragments_preserve_request_order() {
        let mut fixture = CatalogFixture::new();
        let first = fixture.add_software();
        let second = fixture.add_software();
        let snapshot = CatalogSnapshot::index(fixture.build());
        let fragmenter = MetadataFragmenter::new();

        let info = get_extended_update_info(
            &snapshot,
            &fragmenter,
            None,
            &request(
                vec![fixture.ordinal_of(&second), fixture.ordinal_of(&first)],
                vec![XmlUpdateFragmentType::Extended],
            ),
        )
        .unwrap();

        let ids: Vec<i32> = info.updates.iter().map(|u| u.id).collect();
        assert_eq!(
            ids,
            vec![fixture.ordinal_of(&second), fixture.ordinal_of(&first)]
        );
    }

    #[test]
    fn test_localized_properties_only_when_non_empty() {
        let mut fixture = CatalogFixture::new();
        let software = fixture.add_software();
        let snapshot = CatalogSnapshot::index(fixture.build());
        let fragmenter = MetadataFragmenter::new();

        // Synthesized metadata is English-only; a German request matches
        // nothing and contributes no entries.
        let mut req = request(
            vec![fixture.ordinal_of(&software)],
            vec![XmlUpdateFragmentType::LocalizedProperties],
        );
        req.locales = vec!["de".to_string()];
        let info = get_extended_update_info(&snapshot, &fragmenter, None, &req).unwrap();
        assert!(info.updates.is_empty());

        req.locales = vec!["EN".to_string()];
        let info = get_extended_update_info(&snapshot, &fragmenter, None, &req).unwrap();
        assert_eq!(info.updates.len(), 1);
        assert!(info.updates[0].xml.contains("<Language>en</Language>"));
    }

    #[test]
    fn test_content_addressed_file_url() {
        let mut fixture = CatalogFixture::new();
        let software =
            fixture.add_software_with_file(sample_digest(&[0xAB, 0x10, 0xCD]), "setup.exe");
        let snapshot = CatalogSnapshot::index(fixture.build());
        let fragmenter = MetadataFragmenter::new();

        let info = get_extended_update_info(
            &snapshot,
            &fragmenter,
            Some("http://srv:32150"),
            &request(vec![fixture.ordinal_of(&software)], vec![]),
        )
        .unwrap();

        assert_eq!(info.file_locations.len(), 1);
        assert_eq!(
            info.file_locations[0].url,
            "http://srv:32150/Content/CD/ab10cd"
        );
        assert_eq!(info.file_locations[0].file_digest, vec![0xAB, 0x10, 0xCD]);
    }

    #[test]
    fn test_upstream_url_without_content_root() {
        let mut fixture = CatalogFixture::new();
        let software = fixture.add_software_with_file(sample_digest(&[0x01]), "a.cab");
        let snapshot = CatalogSnapshot::index(fixture.build());
        let fragmenter = MetadataFragmenter::new();

        let info = get_extended_update_info(
            &snapshot,
            &fragmenter,
            None,
            &request(vec![fixture.ordinal_of(&software)], vec![]),
        )
        .unwrap();

        assert_eq!(info.file_locations[0].url, "http://upstream.example/a.cab");
    }

    #[test]
    fn test_duplicate_revisions_contribute_files_once() {
        let mut fixture = CatalogFixture::new();
        let software = fixture.add_software_with_file(sample_digest(&[0x02]), "b.cab");
        let snapshot = CatalogSnapshot::index(fixture.build());
        let fragmenter = MetadataFragmenter::new();
        let ordinal = fixture.ordinal_of(&software);

        let info = get_extended_update_info(
            &snapshot,
            &fragmenter,
            None,
            &request(vec![ordinal, ordinal], vec![]),
        )
        .unwrap();

        assert_eq!(info.file_locations.len(), 1);
    }

    #[test]
    fn test_unknown_revision_fails() {
        let fixture = CatalogFixture::new();
        let snapshot = CatalogSnapshot::index(fixture.build());
        let fragmenter = MetadataFragmenter::new();

        assert!(get_extended_update_info(
            &snapshot,
            &fragmenter,
            None,
            &request(vec![404], vec![XmlUpdateFragmentType::Extended]),
        )
        .is_err());
    }
}
