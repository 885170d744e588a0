// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Prerequisite expressions
//!
//! An update's prerequisites are a conjunction of groups: every group must
//! be satisfied, and a group is satisfied when at least one of its GUIDs is
//! in the client's installed set. Detectoid and category GUIDs appear here
//! exactly like regular update GUIDs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// One prerequisite clause: satisfied when any listed GUID is installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteGroup {
    /// GUIDs of which at least one must be present in the installed set
    pub any_of: Vec<Uuid>,
}

impl PrerequisiteGroup {
    /// A clause requiring a single GUID
    pub fn single(id: Uuid) -> Self {
        Self { any_of: vec![id] }
    }

    /// A clause satisfied by any of the given GUIDs
    pub fn any_of(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            any_of: ids.into_iter().collect(),
        }
    }

    /// Evaluate this clause against an installed set
    ///
    /// An empty clause can never be satisfied.
    pub fn is_satisfied(&self, installed: &HashSet<Uuid>) -> bool {
        self.any_of.iter().any(|id| installed.contains(id))
    }
}
