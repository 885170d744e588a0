// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Update identity
//!
//! An update revision is addressed by a GUID plus a revision number. Two
//! updates sharing a GUID with different revision numbers are two revisions
//! of the same logical update.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a single update revision
///
/// Identities are compared and hashed by the full pair: approval, indexing
/// and lookup are all per-revision, never per-GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UpdateIdentity {
    /// The logical update GUID
    pub id: Uuid,

    /// Revision number within the logical update
    pub revision: i32,
}

impl UpdateIdentity {
    /// Create a new identity
    pub fn new(id: Uuid, revision: i32) -> Self {
        Self { id, revision }
    }
}

impl fmt::Display for UpdateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality_is_per_revision() {
        let id = Uuid::new_v4();
        let a = UpdateIdentity::new(id, 100);
        let b = UpdateIdentity::new(id, 101);
        assert_ne!(a, b);
        assert_eq!(a, UpdateIdentity::new(id, 100));
    }

    #[test]
    fn test_identity_ordering_prefers_revision_within_id() {
        let id = Uuid::new_v4();
        let older = UpdateIdentity::new(id, 1);
        let newer = UpdateIdentity::new(id, 2);
        assert!(older < newer);
    }

    #[test]
    fn test_identity_display() {
        let id = Uuid::nil();
        let identity = UpdateIdentity::new(id, 7);
        assert_eq!(
            identity.to_string(),
            "00000000-0000-0000-0000-000000000000.7"
        );
    }
}
