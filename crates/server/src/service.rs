// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SOAP service endpoints
//!
//! The client web service carries the four live operations plus the
//! unimplemented stubs; the simple-auth and reporting services accept
//! anything and answer benignly. Request errors surface as SOAP 1.1
//! faults: caller mistakes fault with `soap:Client`, server-side
//! conditions with `soap:Server`.

use crate::server::ServerState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{debug, warn};
use update_sync_catalog::CatalogError;
use update_sync_protocol::soap;
use update_sync_protocol::{ClientRequest, Cookie, FaultCode};

const TEXT_XML: &str = "text/xml; charset=utf-8";

fn soap_ok(body: String) -> Response {
    ([(header::CONTENT_TYPE, TEXT_XML)], body).into_response()
}

fn soap_fault(code: FaultCode, message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, TEXT_XML)],
        soap::fault(code, message),
    )
        .into_response()
}

fn catalog_fault(error: CatalogError) -> Response {
    warn!("request failed: {error}");
    let code = match error {
        CatalogError::UnknownRevision(_) => FaultCode::Client,
        _ => FaultCode::Server,
    };
    soap_fault(code, &error.to_string())
}

/// `POST /ClientWebService/client.asmx`
pub async fn client_web_service(State(state): State<ServerState>, body: String) -> Response {
    let request = match soap::parse_client_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("rejecting malformed client request: {e}");
            return soap_fault(FaultCode::Client, &e.to_string());
        }
    };

    match request {
        ClientRequest::GetCookie => {
            debug!("issuing fresh cookie");
            soap_ok(soap::get_cookie_response(&Cookie::issue(Utc::now())))
        }
        ClientRequest::GetConfig => {
            soap_ok(soap::config_response("GetConfig", &state.config_info()))
        }
        ClientRequest::GetConfig2 => {
            soap_ok(soap::config_response("GetConfig2", &state.config_info()))
        }
        ClientRequest::SyncUpdates(params) => {
            debug!(
                installed = params.installed_non_leaf_update_ids.len(),
                cached = params.other_cached_update_ids.len(),
                "handling SyncUpdates"
            );
            match state.engine.sync_updates(&params) {
                Ok(info) => soap_ok(soap::sync_updates_response(&info)),
                Err(e) => catalog_fault(e),
            }
        }
        ClientRequest::GetExtendedUpdateInfo(request) => {
            debug!(
                revisions = request.revision_ids.len(),
                "handling GetExtendedUpdateInfo"
            );
            match state.extended_update_info(&request) {
                Ok(info) => soap_ok(soap::extended_update_info_response(&info)),
                Err(e) => catalog_fault(e),
            }
        }
        ClientRequest::Unsupported(operation) => {
            debug!(%operation, "faulting unimplemented operation");
            soap_fault(FaultCode::Server, &format!("not implemented: {operation}"))
        }
    }
}

/// `POST /SimpleAuthWebService/SimpleAuth.asmx`
///
/// Accepts anything and hands out an anonymous authorization cookie.
pub async fn simple_auth_web_service(body: String) -> Response {
    if let Ok(operation) = soap::parse_operation(&body) {
        debug!(%operation, "simple auth stub answering");
    }
    soap_ok(soap::authorization_cookie_response())
}

/// `POST /ReportingWebService/WebService.asmx`
///
/// Accepts any event batch and reports success.
pub async fn reporting_web_service(body: String) -> Response {
    if let Ok(operation) = soap::parse_operation(&body) {
        debug!(%operation, "reporting stub answering");
    }
    soap_ok(soap::report_event_batch_response())
}
