// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Offering engine
//!
//! Converts a client's installed/cached state into the next batch of
//! offers. The algorithm is layered and order-sensitive; the Windows
//! client walks the catalog top-down across successive syncs:
//!
//! - **Phase A**: root categories the client has not cached yet
//! - **Phase B**: non-leaf categories, filtered by applicability
//! - **Phase C**: approved, applicable bundle containers
//! - **Phase D**: approved, applicable leaf software
//!
//! Phases run in order and the first phase producing at least one offer
//! answers the request. Each phase collects one update past the response
//! cap; phases A-C report `Truncated=true` whenever they emit anything,
//! phase D only when the collection overflows the cap. This asymmetry is
//! what the original server does on the wire; the client's state machine
//! is keyed to it.

use crate::events::UnapprovedUpdatesNotifier;
use crate::fragments::MetadataFragmenter;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use update_sync_catalog::{
    ApprovalSet, CatalogError, CatalogHolder, CatalogResult, CatalogSnapshot,
};
use update_sync_model::Update;
use update_sync_protocol::{
    Deployment, DeploymentAction, SyncInfo, SyncUpdateParameters, UpdateInfo,
    DEPLOYMENT_BUNDLED_CHILD_ID, DEPLOYMENT_BUNDLE_ID, DEPLOYMENT_STANDALONE_ID,
    MAX_UPDATES_IN_RESPONSE,
};
use uuid::Uuid;

/// One more than the response cap: the extra slot signals truncation
const COLLECT_LIMIT: usize = MAX_UPDATES_IN_RESPONSE + 1;

/// The sync decision engine
pub struct OfferingEngine {
    catalog: Arc<CatalogHolder>,
    approvals: Arc<ApprovalSet>,
    fragmenter: Arc<MetadataFragmenter>,
    unapproved: Arc<UnapprovedUpdatesNotifier>,
}

impl OfferingEngine {
    pub fn new(
        catalog: Arc<CatalogHolder>,
        approvals: Arc<ApprovalSet>,
        fragmenter: Arc<MetadataFragmenter>,
        unapproved: Arc<UnapprovedUpdatesNotifier>,
    ) -> Self {
        Self {
            catalog,
            approvals,
            fragmenter,
            unapproved,
        }
    }

    /// Answer a `SyncUpdates` call
    pub fn sync_updates(&self, params: &SyncUpdateParameters) -> CatalogResult<SyncInfo> {
        if params.skip_software_sync {
            debug!("client requested driver-only sync");
            return Ok(SyncInfo::empty(Utc::now()));
        }

        let snapshot = self.catalog.snapshot()?;
        let installed = resolve_to_guids(&snapshot, &params.installed_non_leaf_update_ids)?;
        let cached = resolve_to_guids(&snapshot, &params.other_cached_update_ids)?;
        let seen: HashSet<Uuid> = installed.union(&cached).copied().collect();

        let mut info = SyncInfo::empty(Utc::now());

        let roots = self.collect_roots(&snapshot, &seen)?;
        if !roots.is_empty() {
            debug!(count = roots.len(), "phase A: offering root categories");
            info.new_updates = self.encode_non_leaf(&snapshot, &roots)?;
            info.truncated = true;
            return Ok(info);
        }

        let non_leaves = self.collect_non_leaves(&snapshot, &seen, &installed)?;
        if !non_leaves.is_empty() {
            debug!(count = non_leaves.len(), "phase B: offering non-leaf updates");
            info.new_updates = self.encode_non_leaf(&snapshot, &non_leaves)?;
            info.truncated = true;
            return Ok(info);
        }

        let bundles = self.collect_bundles(&snapshot, &seen, &installed)?;
        if !bundles.is_empty() {
            debug!(count = bundles.len(), "phase C: offering bundles");
            info.new_updates = self.encode_software(&snapshot, &bundles)?;
            info.truncated = true;
            return Ok(info);
        }

        let leaves = self.collect_leaf_software(&snapshot, &seen, &installed)?;
        if !leaves.is_empty() {
            debug!(count = leaves.len(), "phase D: offering leaf software");
            info.truncated = leaves.len() > MAX_UPDATES_IN_RESPONSE;
            info.new_updates = self.encode_software(&snapshot, &leaves)?;
        }
        Ok(info)
    }

    /// Phase A: root categories not yet cached by the client
    fn collect_roots(
        &self,
        snapshot: &CatalogSnapshot,
        seen: &HashSet<Uuid>,
    ) -> CatalogResult<Vec<Arc<Update>>> {
        let mut offers = Vec::new();
        for id in snapshot.root_updates() {
            if offers.len() >= COLLECT_LIMIT {
                break;
            }
            if seen.contains(id) {
                continue;
            }
            let Some(identity) = snapshot.latest_identity(id) else {
                continue;
            };
            let update = snapshot
                .category(&identity)
                .ok_or(CatalogError::MissingUpdate(identity))?;
            if update.is_superseded {
                continue;
            }
            offers.push(update);
        }
        Ok(offers)
    }

    /// Phase B: applicable non-leaf updates
    fn collect_non_leaves(
        &self,
        snapshot: &CatalogSnapshot,
        seen: &HashSet<Uuid>,
        installed: &HashSet<Uuid>,
    ) -> CatalogResult<Vec<Arc<Update>>> {
        let mut offers = Vec::new();
        for id in snapshot.non_leaf_updates() {
            if offers.len() >= COLLECT_LIMIT {
                break;
            }
            if seen.contains(id) {
                continue;
            }
            let Some(identity) = snapshot.latest_identity(id) else {
                continue;
            };
            let update = snapshot.resolve(&identity)?;
            if update.is_superseded || !update.is_applicable(installed) {
                continue;
            }
            offers.push(update);
        }
        Ok(offers)
    }

    /// Phase C: approved, applicable bundle containers
    fn collect_bundles(
        &self,
        snapshot: &CatalogSnapshot,
        seen: &HashSet<Uuid>,
        installed: &HashSet<Uuid>,
    ) -> CatalogResult<Vec<Arc<Update>>> {
        let mut approved = Vec::new();
        let mut unapproved = Vec::new();
        for id in snapshot.software_leaf_ids() {
            if seen.contains(id) {
                continue;
            }
            let Some(identity) = snapshot.latest_identity(id) else {
                continue;
            };
            let update = snapshot
                .update(&identity)
                .ok_or(CatalogError::MissingUpdate(identity))?;
            if update.is_superseded || !update.is_applicable(installed) || !update.is_bundle() {
                continue;
            }
            if self.approvals.is_software_approved(&update.identity) {
                if approved.len() < COLLECT_LIMIT {
                    approved.push(update);
                }
            } else {
                unapproved.push(update.identity);
            }
        }
        self.unapproved.notify(unapproved);
        Ok(approved)
    }

    /// Phase D: approved, applicable leaf software
    ///
    /// Bundled children count as approved when any of their bundle
    /// parents is.
    fn collect_leaf_software(
        &self,
        snapshot: &CatalogSnapshot,
        seen: &HashSet<Uuid>,
        installed: &HashSet<Uuid>,
    ) -> CatalogResult<Vec<Arc<Update>>> {
        let mut approved = Vec::new();
        let mut unapproved = Vec::new();
        for id in snapshot.software_leaf_ids() {
            if seen.contains(id) {
                continue;
            }
            let Some(identity) = snapshot.latest_identity(id) else {
                continue;
            };
            let update = snapshot
                .update(&identity)
                .ok_or(CatalogError::MissingUpdate(identity))?;
            if update.is_superseded || !update.is_applicable(installed) || update.is_bundle() {
                continue;
            }
            if self.approvals.is_software_offerable(&update) {
                if approved.len() < COLLECT_LIMIT {
                    approved.push(update);
                }
            } else {
                unapproved.push(update.identity);
            }
        }
        self.unapproved.notify(unapproved);
        Ok(approved)
    }

    /// Encode category offers (phases A and B)
    fn encode_non_leaf(
        &self,
        snapshot: &CatalogSnapshot,
        offers: &[Arc<Update>],
    ) -> CatalogResult<Vec<UpdateInfo>> {
        offers
            .iter()
            .take(MAX_UPDATES_IN_RESPONSE)
            .map(|update| {
                let id = snapshot
                    .latest_revision(&update.identity.id)
                    .ok_or(CatalogError::MissingUpdate(update.identity))?;
                let xml = self.fragmenter.core_fragment(snapshot, &update.identity)?;
                Ok(UpdateInfo {
                    id,
                    deployment: Deployment::evaluate(),
                    is_leaf: false,
                    is_shared: false,
                    verification: None,
                    xml,
                })
            })
            .collect()
    }

    /// Encode software offers (phases C and D)
    fn encode_software(
        &self,
        snapshot: &CatalogSnapshot,
        offers: &[Arc<Update>],
    ) -> CatalogResult<Vec<UpdateInfo>> {
        offers
            .iter()
            .take(MAX_UPDATES_IN_RESPONSE)
            .map(|update| {
                let id = snapshot
                    .latest_revision(&update.identity.id)
                    .ok_or(CatalogError::MissingUpdate(update.identity))?;
                let xml = self.fragmenter.core_fragment(snapshot, &update.identity)?;
                let (action, deployment_id) = if update.is_bundle() {
                    (DeploymentAction::Install, DEPLOYMENT_BUNDLE_ID)
                } else if update.is_bundled() {
                    (DeploymentAction::Bundle, DEPLOYMENT_BUNDLED_CHILD_ID)
                } else {
                    (DeploymentAction::Install, DEPLOYMENT_STANDALONE_ID)
                };
                Ok(UpdateInfo {
                    id,
                    deployment: Deployment::software(action, deployment_id),
                    is_leaf: true,
                    is_shared: false,
                    verification: None,
                    xml,
                })
            })
            .collect()
    }
}

/// Map client revision ordinals to GUIDs
///
/// Any ordinal outside the revision index fails the whole request.
fn resolve_to_guids(
    snapshot: &CatalogSnapshot,
    revisions: &[i32],
) -> CatalogResult<HashSet<Uuid>> {
    revisions
        .iter()
        .map(|&revision| {
            snapshot
                .identity_for_revision(revision)
                .map(|identity| identity.id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use update_sync_test_utils::CatalogFixture;

    fn engine_with(fixture: &CatalogFixture) -> OfferingEngine {
        let catalog = Arc::new(CatalogHolder::empty());
        catalog.set_metadata_source(Some(fixture.build()));
        OfferingEngine::new(
            catalog,
            Arc::new(ApprovalSet::new()),
            Arc::new(MetadataFragmenter::new()),
            Arc::new(UnapprovedUpdatesNotifier::new()),
        )
    }

    #[test]
    fn test_skip_software_sync_is_canned() {
        let fixture = CatalogFixture::new();
        let engine = engine_with(&fixture);

        let params = SyncUpdateParameters {
            skip_software_sync: true,
            ..Default::default()
        };
        let info = engine.sync_updates(&params).unwrap();
        assert!(info.new_updates.is_empty());
        assert!(!info.truncated);
        assert_eq!(info.driver_sync_not_needed, "false");
        assert_eq!(info.new_cookie.encrypted_data, vec![0u8; 12]);
    }

    #[test]
    fn test_unknown_revision_fails_the_request() {
        let fixture = CatalogFixture::new();
        let engine = engine_with(&fixture);

        let params = SyncUpdateParameters {
            installed_non_leaf_update_ids: vec![9999],
            ..Default::default()
        };
        assert!(matches!(
            engine.sync_updates(&params),
            Err(CatalogError::UnknownRevision(9999))
        ));
    }

    #[test]
    fn test_no_catalog_is_unavailable() {
        let engine = OfferingEngine::new(
            Arc::new(CatalogHolder::empty()),
            Arc::new(ApprovalSet::new()),
            Arc::new(MetadataFragmenter::new()),
            Arc::new(UnapprovedUpdatesNotifier::new()),
        );
        assert!(matches!(
            engine.sync_updates(&SyncUpdateParameters::default()),
            Err(CatalogError::Unavailable)
        ));
    }
}
