// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SOAP envelope codec
//!
//! SOAP 1.1 plumbing for the three service endpoints. Parsing is lenient
//! the way the original service is: the operation is the first element
//! inside `soap:Body`, only the parameter fields the server consumes are
//! read, and everything else (headers, cookies, unknown elements) is
//! skipped. Responses are rendered directly; the envelope shape is fixed.

use crate::types::{
    ConfigInfo, Cookie, ExtendedInfoRequest, ExtendedUpdateInfo, SyncInfo, SyncUpdateParameters,
    XmlUpdateFragmentType,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use thiserror::Error;

/// Client web service namespace
pub const CLIENT_SERVICE_NS: &str =
    "http://www.microsoft.com/SoftwareDistribution/Server/ClientWebService";

/// Simple auth web service namespace
pub const SIMPLE_AUTH_NS: &str =
    "http://www.microsoft.com/SoftwareDistribution/Server/SimpleAuthWebService";

/// Reporting web service namespace
pub const REPORTING_NS: &str = "http://www.microsoft.com/SoftwareDistribution";

/// Errors raised while decoding an incoming envelope
#[derive(Debug, Error)]
pub enum SoapError {
    /// The body is not a well-formed SOAP request
    #[error("malformed SOAP request: {0}")]
    Malformed(String),
}

/// SOAP 1.1 fault code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// Caller error: malformed envelope, unknown revision
    Client,
    /// Server error: catalog unavailable, I/O failure, unimplemented call
    Server,
}

impl FaultCode {
    fn as_str(&self) -> &'static str {
        match self {
            FaultCode::Client => "soap:Client",
            FaultCode::Server => "soap:Server",
        }
    }
}

/// A decoded client web service call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    GetCookie,
    GetConfig,
    GetConfig2,
    SyncUpdates(SyncUpdateParameters),
    GetExtendedUpdateInfo(ExtendedInfoRequest),
    /// A known-but-unimplemented or unknown operation, kept by name for
    /// the fault message
    Unsupported(String),
}

/// Decode a client web service envelope
pub fn parse_client_request(body: &str) -> Result<ClientRequest, SoapError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut operation: Option<String> = None;

    let mut sync = SyncUpdateParameters::default();
    let mut extended = ExtendedInfoRequest::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().local_name().as_ref());
                if operation.is_none() && stack.last().is_some_and(|top| top == "Body") {
                    operation = Some(name.clone());
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.name().local_name().as_ref());
                if operation.is_none() && stack.last().is_some_and(|top| top == "Body") {
                    operation = Some(name);
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SoapError::Malformed(e.to_string()))?;
                collect_field(&stack, text.as_ref(), &mut sync, &mut extended)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SoapError::Malformed(e.to_string())),
        }
    }

    let operation =
        operation.ok_or_else(|| SoapError::Malformed("no operation in SOAP body".into()))?;
    Ok(match operation.as_str() {
        "GetCookie" => ClientRequest::GetCookie,
        "GetConfig" => ClientRequest::GetConfig,
        "GetConfig2" => ClientRequest::GetConfig2,
        "SyncUpdates" => ClientRequest::SyncUpdates(sync),
        "GetExtendedUpdateInfo" => ClientRequest::GetExtendedUpdateInfo(extended),
        _ => ClientRequest::Unsupported(operation),
    })
}

/// Extract the operation name of an arbitrary service envelope
///
/// Used by the stub endpoints, which accept anything.
pub fn parse_operation(body: &str) -> Result<String, SoapError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);
    let mut in_body = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = local_name(e.name().local_name().as_ref());
                if in_body {
                    return Ok(name);
                }
                if name == "Body" {
                    in_body = true;
                }
            }
            Ok(Event::Eof) => {
                return Err(SoapError::Malformed("no operation in SOAP body".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(SoapError::Malformed(e.to_string())),
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn collect_field(
    stack: &[String],
    text: &str,
    sync: &mut SyncUpdateParameters,
    extended: &mut ExtendedInfoRequest,
) -> Result<(), SoapError> {
    let leaf = match stack.last() {
        Some(leaf) => leaf.as_str(),
        None => return Ok(()),
    };
    let parent = stack
        .len()
        .checked_sub(2)
        .map(|i| stack[i].as_str())
        .unwrap_or("");

    match (parent, leaf) {
        ("InstalledNonLeafUpdateIDs", "int") => {
            sync.installed_non_leaf_update_ids.push(parse_int(text)?);
        }
        ("OtherCachedUpdateIDs", "int") => {
            sync.other_cached_update_ids.push(parse_int(text)?);
        }
        (_, "SkipSoftwareSync") => sync.skip_software_sync = parse_bool(text),
        (_, "ExpressQuery") => sync.express_query = parse_bool(text),
        ("revisionIDs", "int") => extended.revision_ids.push(parse_int(text)?),
        ("infoTypes", "XmlUpdateFragmentType") => {
            if let Some(kind) = XmlUpdateFragmentType::parse(text) {
                extended.info_types.push(kind);
            }
        }
        ("locales", "string") => extended.locales.push(text.to_string()),
        _ => {}
    }
    Ok(())
}

fn parse_int(text: &str) -> Result<i32, SoapError> {
    text.trim()
        .parse()
        .map_err(|_| SoapError::Malformed(format!("invalid int value '{text}'")))
}

fn parse_bool(text: &str) -> bool {
    matches!(text.trim(), "true" | "1")
}

// Response rendering.

const ENVELOPE_OPEN: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\"><soap:Body>";
const ENVELOPE_CLOSE: &str = "</soap:Body></soap:Envelope>";

fn envelope(inner: &str) -> String {
    format!("{ENVELOPE_OPEN}{inner}{ENVELOPE_CLOSE}")
}

fn text_element(name: &str, value: &str) -> String {
    format!("<{name}>{}</{name}>", escape(value))
}

fn bool_element(name: &str, value: bool) -> String {
    format!("<{name}>{value}</{name}>")
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn cookie_xml(tag: &str, cookie: &Cookie) -> String {
    format!(
        "<{tag}>{}{}</{tag}>",
        text_element("Expiration", &format_instant(cookie.expiration)),
        text_element("EncryptedData", &BASE64.encode(&cookie.encrypted_data)),
    )
}

/// Render a `GetCookieResponse` envelope
pub fn get_cookie_response(cookie: &Cookie) -> String {
    envelope(&format!(
        "<GetCookieResponse xmlns=\"{CLIENT_SERVICE_NS}\">{}</GetCookieResponse>",
        cookie_xml("GetCookieResult", cookie)
    ))
}

/// Render a `SyncUpdatesResponse` envelope
pub fn sync_updates_response(info: &SyncInfo) -> String {
    let mut result = String::new();

    if !info.new_updates.is_empty() {
        result.push_str("<NewUpdates>");
        for update in &info.new_updates {
            result.push_str("<UpdateInfo>");
            result.push_str(&format!("<ID>{}</ID>", update.id));
            let d = &update.deployment;
            result.push_str("<Deployment>");
            result.push_str(&format!("<ID>{}</ID>", d.id));
            result.push_str(&text_element("Action", d.action.as_str()));
            result.push_str(&bool_element("IsAssigned", d.is_assigned));
            result.push_str(&text_element("LastChangeTime", d.last_change_time));
            result.push_str(&text_element("AutoSelect", d.auto_select));
            result.push_str(&text_element("AutoDownload", d.auto_download));
            result.push_str(&text_element(
                "SupersedenceBehavior",
                d.supersedence_behavior,
            ));
            result.push_str("</Deployment>");
            result.push_str(&bool_element("IsLeaf", update.is_leaf));
            result.push_str(&bool_element("IsShared", update.is_shared));
            match &update.verification {
                Some(verification) => {
                    result.push_str(&text_element("Verification", verification));
                }
                None => {}
            }
            result.push_str(&text_element("Xml", &update.xml));
            result.push_str("</UpdateInfo>");
        }
        result.push_str("</NewUpdates>");
    }

    result.push_str(&bool_element("Truncated", info.truncated));
    result.push_str(&cookie_xml("NewCookie", &info.new_cookie));
    result.push_str(&text_element(
        "DriverSyncNotNeeded",
        info.driver_sync_not_needed,
    ));

    envelope(&format!(
        "<SyncUpdatesResponse xmlns=\"{CLIENT_SERVICE_NS}\">\
<SyncUpdatesResult>{result}</SyncUpdatesResult></SyncUpdatesResponse>"
    ))
}

/// Render a `GetConfigResponse` / `GetConfig2Response` envelope
pub fn config_response(operation: &str, config: &ConfigInfo) -> String {
    let mut result = String::new();
    result.push_str(&text_element(
        "LastChange",
        &format_instant(config.last_change),
    ));
    result.push_str(&bool_element(
        "IsRegistrationRequired",
        config.is_registration_required,
    ));
    result.push_str("<AuthInfo>");
    for plug_in in &config.auth_info {
        result.push_str("<AuthPlugInInfo>");
        result.push_str(&text_element("PlugInID", plug_in.plug_in_id));
        result.push_str(&text_element("ServiceUrl", plug_in.service_url));
        result.push_str(&text_element("Parameter", plug_in.parameter));
        result.push_str("</AuthPlugInInfo>");
    }
    result.push_str("</AuthInfo>");
    result.push_str("<Properties>");
    match &config.properties {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                result.push_str(&format!(
                    "<Property Name=\"{}\">{}</Property>",
                    escape(key),
                    escape(&rendered)
                ));
            }
        }
        serde_json::Value::Null => {}
        other => result.push_str(&escape(&other.to_string())),
    }
    result.push_str("</Properties>");

    envelope(&format!(
        "<{operation}Response xmlns=\"{CLIENT_SERVICE_NS}\">\
<{operation}Result>{result}</{operation}Result></{operation}Response>"
    ))
}

/// Render a `GetExtendedUpdateInfoResponse` envelope
pub fn extended_update_info_response(info: &ExtendedUpdateInfo) -> String {
    let mut result = String::new();

    if !info.updates.is_empty() {
        result.push_str("<Updates>");
        for update in &info.updates {
            result.push_str("<Update>");
            result.push_str(&format!("<ID>{}</ID>", update.id));
            result.push_str(&text_element("Xml", &update.xml));
            result.push_str("</Update>");
        }
        result.push_str("</Updates>");
    }

    if !info.file_locations.is_empty() {
        result.push_str("<FileLocations>");
        for location in &info.file_locations {
            result.push_str("<FileLocation>");
            result.push_str(&text_element(
                "FileDigest",
                &BASE64.encode(&location.file_digest),
            ));
            result.push_str(&text_element("Url", &location.url));
            result.push_str("</FileLocation>");
        }
        result.push_str("</FileLocations>");
    }

    envelope(&format!(
        "<GetExtendedUpdateInfoResponse xmlns=\"{CLIENT_SERVICE_NS}\">\
<GetExtendedUpdateInfoResult>{result}</GetExtendedUpdateInfoResult>\
</GetExtendedUpdateInfoResponse>"
    ))
}

/// Render a SOAP 1.1 fault envelope
pub fn fault(code: FaultCode, message: &str) -> String {
    envelope(&format!(
        "<soap:Fault>{}{}<detail/></soap:Fault>",
        text_element("faultcode", code.as_str()),
        text_element("faultstring", message),
    ))
}

/// Render the benign `GetAuthorizationCookieResponse` of the auth stub
pub fn authorization_cookie_response() -> String {
    envelope(&format!(
        "<GetAuthorizationCookieResponse xmlns=\"{SIMPLE_AUTH_NS}\">\
<GetAuthorizationCookieResult>{}{}</GetAuthorizationCookieResult>\
</GetAuthorizationCookieResponse>",
        text_element("PlugInId", "Anonymous"),
        text_element("CookieData", &BASE64.encode([0u8; 12])),
    ))
}

/// Render the benign reply of the reporting stub
pub fn report_event_batch_response() -> String {
    envelope(&format!(
        "<ReportEventBatchResponse xmlns=\"{REPORTING_NS}\">\
{}</ReportEventBatchResponse>",
        text_element("ReportEventBatchResult", "true"),
    ))
}
