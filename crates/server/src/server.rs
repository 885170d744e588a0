// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Server assembly
//!
//! [`UpdateServer`] wires the catalog holder, approval sets, offering
//! engine, fragmenter and content service together, exposes the axum
//! router for the three endpoints, and carries the management surface
//! (catalog swaps, approvals, the unapproved-updates subscription).

use crate::config::{self, ConfigError, ServerOptions};
use crate::content::{get_content, head_content, ContentService};
use crate::engine::OfferingEngine;
use crate::events::{UnapprovedUpdatesEvent, UnapprovedUpdatesNotifier};
use crate::extended::get_extended_update_info;
use crate::fragments::MetadataFragmenter;
use crate::service::{client_web_service, reporting_web_service, simple_auth_web_service};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use update_sync_catalog::{ApprovalSet, CatalogHolder, CatalogResult};
use update_sync_model::{FsContentSource, MetadataSource, StaticMetadataSource};
use update_sync_protocol::{ConfigInfo, ExtendedInfoRequest, ExtendedUpdateInfo};

/// Shared state of every request handler
#[derive(Clone)]
pub struct ServerState {
    pub catalog: Arc<CatalogHolder>,
    pub approvals: Arc<ApprovalSet>,
    pub fragmenter: Arc<MetadataFragmenter>,
    pub engine: Arc<OfferingEngine>,
    pub unapproved: Arc<UnapprovedUpdatesNotifier>,
    pub content: Option<Arc<ContentService>>,
    pub content_http_root: Option<String>,
    pub properties: Arc<serde_json::Value>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    /// The config reply body
    pub fn config_info(&self) -> ConfigInfo {
        ConfigInfo::new(self.started_at, (*self.properties).clone())
    }

    /// Answer `GetExtendedUpdateInfo` against the pinned snapshot
    pub fn extended_update_info(
        &self,
        request: &ExtendedInfoRequest,
    ) -> CatalogResult<ExtendedUpdateInfo> {
        let snapshot = self.catalog.snapshot()?;
        get_extended_update_info(
            &snapshot,
            &self.fragmenter,
            self.content_http_root.as_deref(),
            request,
        )
    }

    /// Swap the catalog and everything derived from it
    ///
    /// Publishes the new snapshot, drops memoized fragments of the old
    /// generation, and rebuilds the content index.
    pub fn set_metadata_source(&self, source: Option<Arc<dyn MetadataSource>>) {
        self.catalog.set_metadata_source(source);
        self.fragmenter.clear();
        if let Some(content) = &self.content {
            let updates = self
                .catalog
                .snapshot()
                .map(|snapshot| snapshot.updates())
                .unwrap_or_default();
            content.reindex(&updates);
        }
    }
}

/// The assembled update sync server
pub struct UpdateServer {
    state: ServerState,
}

impl UpdateServer {
    /// Build a server from process options
    ///
    /// Loads the configuration document and, when configured, the
    /// metadata source and content store.
    pub fn new(options: &ServerOptions) -> Result<Self, ConfigError> {
        options.validate()?;

        let properties = match &options.config_path {
            Some(path) => config::load_properties(path)?,
            None => serde_json::Value::Object(Default::default()),
        };

        let content = options
            .content_path
            .as_ref()
            .map(|path| Arc::new(ContentService::new(Arc::new(FsContentSource::new(path)))));

        let catalog = Arc::new(CatalogHolder::empty());
        let approvals = Arc::new(ApprovalSet::new());
        let fragmenter = Arc::new(MetadataFragmenter::new());
        let unapproved = Arc::new(UnapprovedUpdatesNotifier::new());
        let engine = Arc::new(OfferingEngine::new(
            catalog.clone(),
            approvals.clone(),
            fragmenter.clone(),
            unapproved.clone(),
        ));

        let state = ServerState {
            catalog,
            approvals,
            fragmenter,
            engine,
            unapproved,
            content,
            content_http_root: options.content_http_root.clone(),
            properties: Arc::new(properties),
            started_at: Utc::now(),
        };
        let server = Self { state };

        if let Some(path) = &options.metadata_path {
            let source =
                StaticMetadataSource::from_manifest_dir(path).map_err(|e| ConfigError::Io {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            server.state.set_metadata_source(Some(Arc::new(source)));
        } else {
            warn!("starting without a catalog; load one through the management surface");
        }

        Ok(server)
    }

    /// Build a server around pre-assembled state (tests, embedders)
    pub fn from_state(state: ServerState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// The axum router for all three endpoints
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/ClientWebService/client.asmx", post(client_web_service))
            .route(
                "/SimpleAuthWebService/SimpleAuth.asmx",
                post(simple_auth_web_service),
            )
            .route(
                "/ReportingWebService/WebService.asmx",
                post(reporting_web_service),
            );
        if self.state.content.is_some() {
            router = router.route(
                "/Content/:directory/:name",
                get(get_content).head(head_content),
            );
        }
        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    // Management surface.

    /// Replace or clear the catalog
    pub fn set_metadata_source(&self, source: Option<Arc<dyn MetadataSource>>) {
        self.state.set_metadata_source(source);
    }

    /// The mutable approval sets
    pub fn approvals(&self) -> &ApprovalSet {
        &self.state.approvals
    }

    /// Subscribe to unapproved-updates events
    pub fn subscribe_unapproved(&self) -> broadcast::Receiver<UnapprovedUpdatesEvent> {
        self.state.unapproved.subscribe()
    }

    /// Approve every software update in the current catalog
    ///
    /// Returns the number of approvals added; zero when no catalog is
    /// loaded.
    pub fn approve_all_software(&self) -> usize {
        let Ok(snapshot) = self.state.catalog.snapshot() else {
            return 0;
        };
        let identities: Vec<_> = snapshot
            .updates()
            .into_iter()
            .map(|update| update.identity)
            .collect();
        let count = identities.len();
        self.state.approvals.approve_software_many(identities);
        info!(count, "approved every software update in the catalog");
        count
    }
}
