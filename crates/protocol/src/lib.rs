// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Update Sync Server - Protocol Layer
//!
//! Wire types and SOAP plumbing for the client/server synchronization
//! protocol (MS-WUSP):
//!
//! - [`types`]: cookies, sync replies, deployments, extended update info,
//!   config replies, and the protocol-observable constants
//! - [`soap`]: SOAP 1.1 envelope parsing for incoming calls, response and
//!   fault rendering for outgoing ones
//!
//! The types here are transport-shaped: they say what goes on the wire,
//! not how offers are computed. The offering logic lives in the server
//! crate.

pub mod soap;
pub mod types;

// Re-exports
pub use soap::{ClientRequest, FaultCode, SoapError};
pub use types::{
    AuthPlugInInfo, ConfigInfo, Cookie, Deployment, DeploymentAction, ExtendedInfoRequest,
    ExtendedUpdateInfo, FileLocation, SyncInfo, SyncUpdateParameters, UpdateData, UpdateInfo,
    XmlUpdateFragmentType, COOKIE_ENCRYPTED_DATA_LEN, COOKIE_LIFETIME_DAYS,
    DEPLOYMENT_BUNDLED_CHILD_ID, DEPLOYMENT_BUNDLE_ID, DEPLOYMENT_EVALUATE_ID,
    DEPLOYMENT_LAST_CHANGE_TIME, DEPLOYMENT_STANDALONE_ID, MAX_UPDATES_IN_RESPONSE,
};
