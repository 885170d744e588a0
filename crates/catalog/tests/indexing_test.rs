// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Integration tests for catalog indexing and snapshot publication

use std::sync::Arc;
use update_sync_catalog::{ApprovalSet, CatalogHolder};
use update_sync_test_utils::CatalogFixture;

#[test]
fn swapping_the_same_source_twice_yields_identical_indices() {
    let mut fixture = CatalogFixture::new();
    let software = fixture.add_software();
    fixture.add_bundle(2);
    let source = fixture.build();

    let holder = CatalogHolder::empty();
    holder.set_metadata_source(Some(source.clone()));
    let first = holder.snapshot().unwrap();

    holder.set_metadata_source(Some(source));
    let second = holder.snapshot().unwrap();

    assert_eq!(first.root_updates(), second.root_updates());
    assert_eq!(first.non_leaf_updates(), second.non_leaf_updates());
    assert_eq!(first.leaf_updates(), second.leaf_updates());
    assert_eq!(first.software_leaf_ids(), second.software_leaf_ids());
    assert_eq!(first.revision_count(), second.revision_count());
    assert_eq!(
        first.latest_identity(&software.id),
        second.latest_identity(&software.id)
    );
}

#[test]
fn revision_index_is_a_bijection_over_the_catalog() {
    let mut fixture = CatalogFixture::new();
    for _ in 0..5 {
        fixture.add_software();
    }
    let holder = CatalogHolder::empty();
    holder.set_metadata_source(Some(fixture.build()));
    let snapshot = holder.snapshot().unwrap();

    let mut seen = std::collections::HashSet::new();
    for ordinal in 1..=snapshot.revision_count() as i32 {
        let identity = snapshot.identity_for_revision(ordinal).unwrap();
        assert!(seen.insert(identity), "ordinal {ordinal} duplicates an identity");
        assert!(snapshot.resolve(&identity).is_ok());
    }
}

#[test]
fn approvals_survive_catalog_swaps() {
    let mut fixture = CatalogFixture::new();
    let software = fixture.add_software();

    let holder = CatalogHolder::empty();
    let approvals = Arc::new(ApprovalSet::new());
    approvals.approve_software(software);

    holder.set_metadata_source(Some(fixture.build()));
    assert!(approvals.is_software_approved(&software));

    holder.set_metadata_source(None);
    assert!(approvals.is_software_approved(&software));
}
