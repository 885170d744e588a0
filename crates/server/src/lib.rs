// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Update Sync Server
//!
//! Server-side implementation of the Microsoft Update client/server
//! synchronization protocol (MS-WUSP). The built-in Windows update client
//! presents what it has installed and cached; this server answers with the
//! next batch of applicable, approved updates plus the metadata needed to
//! download and install them.
//!
//! ## Architecture
//!
//! ```text
//! Windows Update client
//!   │ SOAP over HTTP                       │ GET/HEAD /Content/...
//!   ↓                                      ↓
//! /ClientWebService/client.asmx       Content Router
//!   │                                      │
//!   ↓                                      ↓
//! Offering Engine ──► Catalog Snapshot   Content Store
//!   │                   (arc-swapped)
//!   ├─► Approval Set
//!   └─► Metadata Fragmenter
//! ```
//!
//! ## Request lifecycle
//!
//! Every sync or extended-info request pins the current catalog snapshot
//! once and reads all catalog-derived state (including metadata XML)
//! through it. Catalog swaps build the next snapshot off to the side and
//! publish it atomically, so in-flight requests finish against a
//! consistent generation. Content requests never touch the catalog.
//!
//! ## Modules
//!
//! - [`engine`]: the four-phase offering algorithm
//! - [`fragments`]: core / extended / localized metadata fragments
//! - [`extended`]: the `GetExtendedUpdateInfo` responder
//! - [`content`]: content-addressed payload delivery
//! - [`service`]: SOAP endpoints and the stub services
//! - [`server`]: state assembly, router, management surface
//! - [`config`]: process configuration
//! - [`events`]: the unapproved-updates notification

pub mod config;
pub mod content;
pub mod engine;
pub mod events;
pub mod extended;
pub mod fragments;
pub mod server;
pub mod service;

// Re-exports for convenience
pub use config::{ConfigError, ServerOptions};
pub use content::{ContentIndex, ContentService};
pub use engine::OfferingEngine;
pub use events::{UnapprovedUpdatesEvent, UnapprovedUpdatesNotifier};
pub use fragments::MetadataFragmenter;
pub use server::{ServerState, UpdateServer};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name
pub const SERVER_NAME: &str = "update-sync-server";
