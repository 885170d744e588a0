// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Protocol wire types
//!
//! The reply and parameter shapes of the four live client operations, plus
//! the constants the Windows client's state machine observes on the wire.
//! Deployment IDs and the deployment change date are protocol constants;
//! changing them changes client behavior.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on updates per sync reply
///
/// Collectors gather one more than this to detect truncation; encoders
/// never emit more than this.
pub const MAX_UPDATES_IN_RESPONSE: usize = 50;

/// Cookie lifetime granted on every call
pub const COOKIE_LIFETIME_DAYS: i64 = 5;

/// Length of the opaque cookie payload
pub const COOKIE_ENCRYPTED_DATA_LEN: usize = 12;

/// Deployment ID for category offers (phases A and B)
pub const DEPLOYMENT_EVALUATE_ID: i32 = 15000;

/// Deployment ID for bundle containers
pub const DEPLOYMENT_BUNDLE_ID: i32 = 20000;

/// Deployment ID for bundled children
pub const DEPLOYMENT_BUNDLED_CHILD_ID: i32 = 20001;

/// Deployment ID for standalone software
pub const DEPLOYMENT_STANDALONE_ID: i32 = 20002;

/// Deployment change date presented for every offer
pub const DEPLOYMENT_LAST_CHANGE_TIME: &str = "2019-08-06";

/// The opaque client cookie
///
/// Stateless on the server side: every call synthesizes a fresh one and
/// accepts any incoming value unread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Expiration instant
    pub expiration: DateTime<Utc>,

    /// Opaque payload, always zeroed
    pub encrypted_data: Vec<u8>,
}

impl Cookie {
    /// Issue a fresh cookie valid for the protocol lifetime from `now`
    pub fn issue(now: DateTime<Utc>) -> Self {
        Self {
            expiration: now + Duration::days(COOKIE_LIFETIME_DAYS),
            encrypted_data: vec![0u8; COOKIE_ENCRYPTED_DATA_LEN],
        }
    }
}

/// Parameters of a `SyncUpdates` call, as read off the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncUpdateParameters {
    /// Revision ordinals of non-leaf updates the client evaluated as
    /// installed
    pub installed_non_leaf_update_ids: Vec<i32>,

    /// Revision ordinals the client already has cached metadata for
    pub other_cached_update_ids: Vec<i32>,

    /// When set, the client only wants driver sync
    pub skip_software_sync: bool,

    /// Accepted and ignored
    pub express_query: bool,
}

/// Deployment action of an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentAction {
    /// Evaluate only (categories and detectoids)
    Evaluate,
    /// Install directly
    Install,
    /// Installed through the carrying bundle
    Bundle,
}

impl DeploymentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentAction::Evaluate => "Evaluate",
            DeploymentAction::Install => "Install",
            DeploymentAction::Bundle => "Bundle",
        }
    }
}

/// Deployment record attached to every offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub action: DeploymentAction,
    pub id: i32,
    pub auto_download: &'static str,
    pub auto_select: &'static str,
    pub supersedence_behavior: &'static str,
    pub is_assigned: bool,
    pub last_change_time: &'static str,
}

impl Deployment {
    fn with_action(action: DeploymentAction, id: i32) -> Self {
        Self {
            action,
            id,
            auto_download: "0",
            auto_select: "0",
            supersedence_behavior: "0",
            is_assigned: true,
            last_change_time: DEPLOYMENT_LAST_CHANGE_TIME,
        }
    }

    /// Deployment of a category offer
    pub fn evaluate() -> Self {
        Self::with_action(DeploymentAction::Evaluate, DEPLOYMENT_EVALUATE_ID)
    }

    /// Deployment of a software offer
    pub fn software(action: DeploymentAction, id: i32) -> Self {
        Self::with_action(action, id)
    }
}

/// One offered update in a sync reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    /// Revision ordinal the client uses for later calls
    pub id: i32,

    pub deployment: Deployment,
    pub is_leaf: bool,
    pub is_shared: bool,
    pub verification: Option<String>,

    /// Core metadata XML fragment
    pub xml: String,
}

/// Reply of a `SyncUpdates` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInfo {
    pub new_cookie: Cookie,
    pub new_updates: Vec<UpdateInfo>,
    pub truncated: bool,

    /// Always `"false"`: driver sync is advertised as available but this
    /// server never produces driver offers
    pub driver_sync_not_needed: &'static str,
}

impl SyncInfo {
    /// An empty reply carrying only a fresh cookie
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            new_cookie: Cookie::issue(now),
            new_updates: Vec::new(),
            truncated: false,
            driver_sync_not_needed: "false",
        }
    }
}

/// Metadata fragment families a client may request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlUpdateFragmentType {
    Extended,
    LocalizedProperties,
    Eula,
}

impl XmlUpdateFragmentType {
    /// Parse the wire form; unknown values are ignored by the caller
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Extended" => Some(Self::Extended),
            "LocalizedProperties" => Some(Self::LocalizedProperties),
            "Eula" => Some(Self::Eula),
            _ => None,
        }
    }
}

/// Parameters of a `GetExtendedUpdateInfo` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedInfoRequest {
    pub revision_ids: Vec<i32>,
    pub info_types: Vec<XmlUpdateFragmentType>,
    pub locales: Vec<String>,
}

/// One metadata fragment in an extended info reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateData {
    pub id: i32,
    pub xml: String,
}

/// Download location of one update file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    /// Raw digest bytes identifying the file
    pub file_digest: Vec<u8>,

    /// Content-addressed or upstream URL
    pub url: String,
}

/// Reply of a `GetExtendedUpdateInfo` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedUpdateInfo {
    pub updates: Vec<UpdateData>,
    pub file_locations: Vec<FileLocation>,
}

/// One authentication plug-in advertisement in a config reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPlugInInfo {
    pub plug_in_id: &'static str,
    pub service_url: &'static str,
    pub parameter: &'static str,
}

/// Reply of the `GetConfig` / `GetConfig2` calls
#[derive(Debug, Clone)]
pub struct ConfigInfo {
    /// Server start instant
    pub last_change: DateTime<Utc>,

    pub is_registration_required: bool,

    /// Always the PID validator and the anonymous plug-in
    pub auth_info: Vec<AuthPlugInInfo>,

    /// Operator-supplied properties, echoed through
    pub properties: serde_json::Value,
}

impl ConfigInfo {
    pub fn new(last_change: DateTime<Utc>, properties: serde_json::Value) -> Self {
        Self {
            last_change,
            is_registration_required: false,
            auth_info: vec![
                AuthPlugInInfo {
                    plug_in_id: "PidValidator",
                    service_url: "",
                    parameter: "",
                },
                AuthPlugInInfo {
                    plug_in_id: "Anonymous",
                    service_url: "",
                    parameter: "",
                },
            ],
            properties,
        }
    }
}
