// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Approval sets
//!
//! The two mutable sets of approved update identities. Approval is
//! per-revision: an approved `(id, revision)` pair says nothing about other
//! revisions of the same logical update. The sets live across catalog
//! swaps.
//!
//! Mutations come from the management surface while the offering engine
//! reads concurrently; each operation is atomic on its own, and an
//! in-flight request may observe a mix of pre- and post-mutation state.

use dashmap::DashSet;
use tracing::info;
use update_sync_model::{Update, UpdateIdentity};

/// Concurrency-safe sets of approved software and driver identities
#[derive(Debug, Default)]
pub struct ApprovalSet {
    software: DashSet<UpdateIdentity>,
    drivers: DashSet<UpdateIdentity>,
}

impl ApprovalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve a single software update revision
    pub fn approve_software(&self, identity: UpdateIdentity) {
        self.software.insert(identity);
    }

    /// Approve many software update revisions
    pub fn approve_software_many(&self, identities: impl IntoIterator<Item = UpdateIdentity>) {
        let mut count = 0usize;
        for identity in identities {
            self.software.insert(identity);
            count += 1;
        }
        info!(count, "approved software updates");
    }

    /// Withdraw approval of a software update revision
    pub fn revoke_software(&self, identity: &UpdateIdentity) {
        self.software.remove(identity);
    }

    /// Withdraw every software approval
    pub fn clear_software(&self) {
        self.software.clear();
    }

    /// Whether a software update revision is approved
    pub fn is_software_approved(&self, identity: &UpdateIdentity) -> bool {
        self.software.contains(identity)
    }

    /// Whether a software update may be offered
    ///
    /// True when its own identity is approved, or when it is bundled and
    /// any of its bundle parents is approved.
    pub fn is_software_offerable(&self, update: &Update) -> bool {
        self.is_software_approved(&update.identity)
            || update
                .bundle_parents()
                .iter()
                .any(|parent| self.is_software_approved(parent))
    }

    /// Approve a single driver update revision
    pub fn approve_driver(&self, identity: UpdateIdentity) {
        self.drivers.insert(identity);
    }

    /// Approve many driver update revisions
    pub fn approve_driver_many(&self, identities: impl IntoIterator<Item = UpdateIdentity>) {
        for identity in identities {
            self.drivers.insert(identity);
        }
    }

    /// Withdraw approval of a driver update revision
    pub fn revoke_driver(&self, identity: &UpdateIdentity) {
        self.drivers.remove(identity);
    }

    /// Withdraw every driver approval
    pub fn clear_drivers(&self) {
        self.drivers.clear();
    }

    /// Whether a driver update revision is approved
    pub fn is_driver_approved(&self, identity: &UpdateIdentity) -> bool {
        self.drivers.contains(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity(revision: i32) -> UpdateIdentity {
        UpdateIdentity::new(Uuid::new_v4(), revision)
    }

    #[test]
    fn test_approval_is_per_revision() {
        let approvals = ApprovalSet::new();
        let id = Uuid::new_v4();
        approvals.approve_software(UpdateIdentity::new(id, 1));

        assert!(approvals.is_software_approved(&UpdateIdentity::new(id, 1)));
        assert!(!approvals.is_software_approved(&UpdateIdentity::new(id, 2)));
    }

    #[test]
    fn test_revoke_and_clear() {
        let approvals = ApprovalSet::new();
        let a = identity(1);
        let b = identity(1);
        approvals.approve_software_many([a, b]);

        approvals.revoke_software(&a);
        assert!(!approvals.is_software_approved(&a));
        assert!(approvals.is_software_approved(&b));

        approvals.clear_software();
        assert!(!approvals.is_software_approved(&b));
    }

    #[test]
    fn test_bundle_parent_approval_makes_child_offerable() {
        let approvals = ApprovalSet::new();
        let parent = identity(3);
        let child = Update::software(identity(1)).with_bundle_parent(parent);

        assert!(!approvals.is_software_offerable(&child));
        approvals.approve_software(parent);
        assert!(approvals.is_software_offerable(&child));
        // The child's own identity is still unapproved.
        assert!(!approvals.is_software_approved(&child.identity));
    }

    #[test]
    fn test_driver_set_is_independent() {
        let approvals = ApprovalSet::new();
        let a = identity(1);
        approvals.approve_driver(a);
        assert!(approvals.is_driver_approved(&a));
        assert!(!approvals.is_software_approved(&a));

        approvals.clear_drivers();
        assert!(!approvals.is_driver_approved(&a));
    }
}
